//! Edge adjacency for topology queries.

use hashbrown::HashMap;

/// Maps each undirected edge to the faces that use it.
///
/// Edge keys are canonical `(smaller_index, larger_index)` pairs.
#[derive(Debug, Clone)]
pub struct EdgeMap {
    edge_to_faces: HashMap<(u32, u32), Vec<u32>>,
}

impl EdgeMap {
    /// Build the map from a face list.
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<u32>> =
            HashMap::with_capacity(faces.len() * 3 / 2);

        for (face_idx, &[v0, v1, v2]) in faces.iter().enumerate() {
            for (a, b) in [(v0, v1), (v1, v2), (v2, v0)] {
                let key = if a < b { (a, b) } else { (b, a) };
                edge_to_faces.entry(key).or_default().push(face_idx as u32);
            }
        }

        Self { edge_to_faces }
    }

    /// Number of unique undirected edges.
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    /// Edges with exactly one adjacent face.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
    }

    /// Edges with more than two adjacent faces.
    pub fn non_manifold_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() > 2)
            .map(|(&edge, _)| edge)
    }

    /// True when every edge is shared by exactly two faces.
    pub fn is_closed(&self) -> bool {
        !self.edge_to_faces.is_empty() && self.edge_to_faces.values().all(|f| f.len() == 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_triangle_is_all_boundary() {
        let map = EdgeMap::build(&[[0, 1, 2]]);
        assert_eq!(map.edge_count(), 3);
        assert_eq!(map.boundary_edges().count(), 3);
        assert!(!map.is_closed());
    }

    #[test]
    fn test_tetrahedron_is_closed() {
        let faces = [[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        let map = EdgeMap::build(&faces);
        assert_eq!(map.edge_count(), 6);
        assert!(map.is_closed());
        assert_eq!(map.boundary_edges().count(), 0);
        assert_eq!(map.non_manifold_edges().count(), 0);
    }

    #[test]
    fn test_fin_is_non_manifold() {
        let faces = [[0, 1, 2], [1, 0, 3], [0, 1, 4]];
        let map = EdgeMap::build(&faces);
        assert_eq!(map.non_manifold_edges().collect::<Vec<_>>(), vec![(0, 1)]);
    }
}
