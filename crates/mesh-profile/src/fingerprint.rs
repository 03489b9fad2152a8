//! Content fingerprint for a mesh.

use sha2::{Digest, Sha256};

use crate::types::Mesh;

/// Hex SHA-256 over the vertex buffer (little-endian f64, x y z per vertex)
/// followed by the face buffer (little-endian u32).
///
/// The digest depends on vertex and face order: the same solid with its
/// faces listed differently has a different fingerprint.
pub fn fingerprint(mesh: &Mesh) -> String {
    let mut hasher = Sha256::new();
    for v in mesh.vertices() {
        hasher.update(v.x.to_le_bytes());
        hasher.update(v.y.to_le_bytes());
        hasher.update(v.z.to_le_bytes());
    }
    for face in mesh.faces() {
        for idx in face {
            hasher.update(idx.to_le_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_meshes::{cube, cube_at};

    #[test]
    fn test_stable_and_hex() {
        let a = fingerprint(&cube(1.0));
        assert_eq!(a, fingerprint(&cube(1.0)));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_geometry_changes_digest() {
        assert_ne!(fingerprint(&cube(1.0)), fingerprint(&cube_at([0.0, 0.0, 0.5], 1.0)));
    }

    #[test]
    fn test_face_order_changes_digest() {
        let mesh = cube(1.0);
        let (vertices, mut faces) = mesh.clone().into_parts();
        faces.swap(0, 1);
        let reordered = Mesh::from_parts(vertices, faces).unwrap();
        assert_ne!(fingerprint(&mesh), fingerprint(&reordered));
    }

    #[test]
    fn test_tiny_vertex_nudge_changes_digest() {
        let mesh = cube(1.0);
        let (mut vertices, faces) = mesh.clone().into_parts();
        let last = vertices.len() - 1;
        vertices[last].y += 1e-9;
        let nudged = Mesh::from_parts(vertices, faces).unwrap();
        assert_ne!(fingerprint(&mesh), fingerprint(&nudged));
    }

    #[test]
    fn test_winding_swap_within_face_changes_digest() {
        let mesh = cube(1.0);
        let (vertices, mut faces) = mesh.clone().into_parts();
        let [a, b, c] = faces[0];
        faces[0] = [a, c, b];
        let flipped = Mesh::from_parts(vertices, faces).unwrap();
        assert_eq!(flipped.face_count(), mesh.face_count());
        assert_ne!(fingerprint(&mesh), fingerprint(&flipped));
    }
}
