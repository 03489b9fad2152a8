//! Core mesh types: the immutable [`Mesh`], [`Triangle`], and [`BoundingBox`].

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::adjacency::EdgeMap;
use crate::error::{ProfileError, ProfileResult};

/// An indexed triangle mesh.
///
/// Fields are private: every `Mesh` has finite coordinates and face indices
/// that reference existing vertices. Construct one with [`Mesh::from_parts`],
/// [`crate::MeshBuilder`], or [`Mesh::load`]. All analysis takes `&Mesh` and
/// returns new values; nothing mutates a mesh after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Point3<f64>>,
    /// Each face is [v0, v1, v2] with counter-clockwise winding seen from outside.
    faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Build a mesh from raw buffers, checking coordinates and indices.
    ///
    /// An empty face list is accepted here; loaders reject it separately
    /// because an empty *file* is an error while an empty intermediate mesh
    /// is not.
    pub fn from_parts(vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> ProfileResult<Self> {
        for (i, v) in vertices.iter().enumerate() {
            for (axis, value) in [("x", v.x), ("y", v.y), ("z", v.z)] {
                if !value.is_finite() {
                    return Err(ProfileError::invalid_coordinate(i, axis, value));
                }
            }
        }

        let vertex_count = vertices.len();
        for (fi, face) in faces.iter().enumerate() {
            if let Some(&bad) = face.iter().find(|&&idx| idx as usize >= vertex_count) {
                return Err(ProfileError::invalid_vertex_index(fi, bad, vertex_count));
            }
        }

        Ok(Self { vertices, faces })
    }

    /// Vertex positions.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Face index triples.
    #[inline]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// Consume the mesh, returning its buffers.
    pub fn into_parts(self) -> (Vec<Point3<f64>>, Vec<[u32; 3]>) {
        (self.vertices, self.faces)
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces (triangles) in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Axis-aligned bounding box, or None if the mesh has no vertices.
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.vertices)
    }

    /// Iterate over triangles, yielding Triangle structs with actual vertex data.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|&face| self.triangle_of(face))
    }

    /// Get a specific triangle by face index.
    pub fn triangle(&self, face_idx: usize) -> Option<Triangle> {
        self.faces.get(face_idx).map(|&face| self.triangle_of(face))
    }

    #[inline]
    fn triangle_of(&self, [i0, i1, i2]: [u32; 3]) -> Triangle {
        Triangle {
            v0: self.vertices[i0 as usize],
            v1: self.vertices[i1 as usize],
            v2: self.vertices[i2 as usize],
        }
    }

    /// Unit normal per face; `None` for degenerate faces.
    pub fn face_normals(&self) -> Vec<Option<Vector3<f64>>> {
        self.triangles().map(|tri| tri.normal()).collect()
    }

    /// Area per face.
    pub fn face_areas(&self) -> Vec<f64> {
        self.triangles().map(|tri| tri.area()).collect()
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }

    /// Signed volume by the divergence theorem.
    ///
    /// Positive for a closed mesh with outward normals, negative when the
    /// mesh is inside-out. Not meaningful for open meshes.
    pub fn signed_volume(&self) -> f64 {
        let sum: f64 = self
            .triangles()
            .map(|tri| tri.v0.coords.dot(&tri.v1.coords.cross(&tri.v2.coords)))
            .sum();
        sum / 6.0
    }

    /// Absolute enclosed volume.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// Area-weighted centroid of the surface.
    ///
    /// Falls back to the mean vertex position when the total area is zero.
    /// Returns None for a mesh without vertices.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }

        let mut weighted = Vector3::zeros();
        let mut total_area = 0.0;
        for tri in self.triangles() {
            let area = tri.area();
            weighted += tri.centroid().coords * area;
            total_area += area;
        }

        if total_area > 0.0 {
            return Some(Point3::from(weighted / total_area));
        }

        let sum = self
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.coords);
        Some(Point3::from(sum / self.vertices.len() as f64))
    }

    /// Build the edge-to-face map for topology queries.
    pub fn edge_map(&self) -> EdgeMap {
        EdgeMap::build(&self.faces)
    }

    /// True when every undirected edge is shared by exactly two faces.
    pub fn is_watertight(&self) -> bool {
        !self.faces.is_empty() && self.edge_map().is_closed()
    }

    /// Euler characteristic `V - E + F`.
    ///
    /// V counts vertices referenced by at least one face, E counts unique
    /// undirected edges. A closed genus-0 surface gives 2.
    pub fn euler_characteristic(&self) -> i64 {
        let edges = self.edge_map();
        let mut referenced = vec![false; self.vertices.len()];
        for face in &self.faces {
            for &idx in face {
                referenced[idx as usize] = true;
            }
        }
        let v = referenced.iter().filter(|&&r| r).count() as i64;
        v - edges.edge_count() as i64 + self.faces.len() as i64
    }

    /// Copy of the mesh re-centered into object-local space.
    ///
    /// X/Y are moved so the bounding-box center sits at the origin; Z is moved
    /// so the minimum sits at 0.
    pub fn centered(&self) -> Mesh {
        let Some(bounds) = self.bounds() else {
            return self.clone();
        };
        let center = bounds.center();
        let offset = Vector3::new(center.x, center.y, bounds.min.z);
        Mesh {
            vertices: self.vertices.iter().map(|v| *v - offset).collect(),
            faces: self.faces.clone(),
        }
    }
}

/// A triangle with concrete vertex positions.
///
/// Winding is counter-clockwise when viewed from the front (normal points
/// toward viewer).
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Face normal via cross product, not normalized.
    #[inline]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit face normal. Returns None for degenerate triangles.
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len_sq = n.norm_squared();
        if len_sq > f64::EPSILON * f64::EPSILON && len_sq.is_finite() {
            Some(n / len_sq.sqrt())
        } else {
            None
        }
    }

    /// Area of the triangle.
    #[inline]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    /// Center of mass.
    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Create a box from two corners.
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, or None for no points.
    pub fn from_points(points: &[Point3<f64>]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut min = *first;
        let mut max = *first;
        for p in rest {
            min = min.inf(p);
            max = max.sup(p);
        }
        Some(Self { min, max })
    }

    /// Size along each axis.
    #[inline]
    pub fn extents(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }
}

#[cfg(test)]
pub(crate) mod test_meshes {
    use super::*;

    /// Axis-aligned cube from `origin` with the given edge length, outward winding.
    pub fn cube_at(origin: [f64; 3], size: f64) -> Mesh {
        let [x, y, z] = origin;
        let vertices = vec![
            Point3::new(x, y, z),
            Point3::new(x + size, y, z),
            Point3::new(x + size, y + size, z),
            Point3::new(x, y + size, z),
            Point3::new(x, y, z + size),
            Point3::new(x + size, y, z + size),
            Point3::new(x + size, y + size, z + size),
            Point3::new(x, y + size, z + size),
        ];
        let faces = vec![
            // Bottom (z = min)
            [0, 2, 1],
            [0, 3, 2],
            // Top (z = max)
            [4, 5, 6],
            [4, 6, 7],
            // Front (y = min)
            [0, 1, 5],
            [0, 5, 4],
            // Back (y = max)
            [3, 7, 6],
            [3, 6, 2],
            // Left (x = min)
            [0, 4, 7],
            [0, 7, 3],
            // Right (x = max)
            [1, 2, 6],
            [1, 6, 5],
        ];
        Mesh::from_parts(vertices, faces).expect("cube is valid")
    }

    pub fn cube(size: f64) -> Mesh {
        cube_at([0.0, 0.0, 0.0], size)
    }
}

#[cfg(test)]
mod tests {
    use super::test_meshes::{cube, cube_at};
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_parts_rejects_bad_index() {
        let err = Mesh::from_parts(vec![Point3::origin(); 3], vec![[0, 1, 3]]).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::InvalidVertexIndex {
                face_index: 0,
                vertex_index: 3,
                vertex_count: 3
            }
        ));
    }

    #[test]
    fn test_from_parts_rejects_nan() {
        let vertices = vec![Point3::origin(), Point3::new(1.0, f64::NAN, 0.0)];
        let err = Mesh::from_parts(vertices, vec![]).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::InvalidCoordinate {
                vertex_index: 1,
                coordinate: "y",
                ..
            }
        ));
    }

    #[test]
    fn test_cube_measurements() {
        let mesh = cube(10.0);
        assert_relative_eq!(mesh.volume(), 1000.0, epsilon = 1e-9);
        assert!(mesh.signed_volume() > 0.0);
        assert_relative_eq!(mesh.surface_area(), 600.0, epsilon = 1e-9);
        assert!(mesh.is_watertight());
        assert_eq!(mesh.euler_characteristic(), 2);

        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.extents(), Vector3::new(10.0, 10.0, 10.0));
        assert_eq!(bounds.center(), Point3::new(5.0, 5.0, 5.0));

        let c = mesh.centroid().unwrap();
        assert_relative_eq!(c.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(c.z, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let mesh = cube(2.0);
        let normals = mesh.face_normals();
        // Bottom faces point down, top faces point up.
        assert_relative_eq!(normals[0].unwrap().z, -1.0);
        assert_relative_eq!(normals[2].unwrap().z, 1.0);
    }

    #[test]
    fn test_open_mesh_is_not_watertight() {
        let (vertices, mut faces) = cube(1.0).into_parts();
        faces.truncate(10);
        let open = Mesh::from_parts(vertices, faces).unwrap();
        assert!(!open.is_watertight());
    }

    #[test]
    fn test_degenerate_triangle_has_no_normal() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(tri.normal().is_none());
        assert_eq!(tri.area(), 0.0);
    }

    #[test]
    fn test_centroid_falls_back_to_vertex_mean() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
        ];
        let mesh = Mesh::from_parts(vertices, vec![[0, 1, 2]]).unwrap();
        assert_eq!(mesh.centroid(), Some(Point3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_centered_moves_to_object_space() {
        let mesh = cube_at([100.0, 50.0, 7.0], 10.0);
        let centered = mesh.centered();
        let b = centered.bounds().unwrap();
        assert_relative_eq!(b.min.x, -5.0);
        assert_relative_eq!(b.max.y, 5.0);
        assert_relative_eq!(b.min.z, 0.0);
        assert_relative_eq!(b.max.z, 10.0);
        // The original is untouched.
        assert_relative_eq!(mesh.bounds().unwrap().min.x, 100.0);
    }
}
