//! Scene concatenation.
//!
//! Files such as OBJ and 3MF can hold several disjoint geometries. They are
//! merged into one index space by appending each sub-mesh's vertices and
//! renumbering its faces against the running vertex offset. Every sub-mesh is
//! consumed as it is appended, so no buffer is ever shared between parts.
//!
//! ```
//! use mesh_profile::MeshBuilder;
//! use nalgebra::Point3;
//!
//! let tri = || {
//!     (
//!         vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
//!         vec![[0, 1, 2]],
//!     )
//! };
//!
//! let mut builder = MeshBuilder::new();
//! let (v, f) = tri();
//! builder.push_part(v, f).unwrap();
//! let (v, f) = tri();
//! builder.push_part(v, f).unwrap();
//!
//! let mesh = builder.build().unwrap();
//! assert_eq!(mesh.faces()[1], [3, 4, 5]);
//! ```

use nalgebra::Point3;
use tracing::debug;

use crate::error::{ProfileError, ProfileResult};
use crate::types::Mesh;

/// Accumulates sub-meshes into a single [`Mesh`].
#[derive(Debug, Default)]
pub struct MeshBuilder {
    vertices: Vec<Point3<f64>>,
    faces: Vec<[u32; 3]>,
    parts: usize,
}

impl MeshBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with pre-allocated capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
            parts: 0,
        }
    }

    /// Append one sub-mesh whose face indices are local to `vertices`.
    ///
    /// Indices are checked against the sub-mesh before renumbering, so an
    /// error names the face as it appeared in the part.
    pub fn push_part(
        &mut self,
        vertices: Vec<Point3<f64>>,
        faces: Vec<[u32; 3]>,
    ) -> ProfileResult<&mut Self> {
        let local_count = vertices.len();
        let total = self.vertices.len() + local_count;
        if total > u32::MAX as usize {
            return Err(ProfileError::invalid_parameter(
                "vertex_count",
                total as f64,
                "scene exceeds the 32-bit index range",
            ));
        }
        let offset = self.vertices.len() as u32;

        for (fi, face) in faces.iter().enumerate() {
            if let Some(&bad) = face.iter().find(|&&idx| idx as usize >= local_count) {
                return Err(ProfileError::invalid_vertex_index(
                    self.faces.len() + fi,
                    bad,
                    local_count,
                ));
            }
        }

        debug!(
            part = self.parts,
            vertices = local_count,
            faces = faces.len(),
            offset,
            "Appending scene part"
        );

        self.vertices.extend(vertices);
        self.faces.extend(
            faces
                .into_iter()
                .map(|[a, b, c]| [a + offset, b + offset, c + offset]),
        );
        self.parts += 1;
        Ok(self)
    }

    /// Number of parts appended so far.
    pub fn part_count(&self) -> usize {
        self.parts
    }

    /// Finish, validating coordinates of the merged mesh.
    pub fn build(self) -> ProfileResult<Mesh> {
        Mesh::from_parts(self.vertices, self.faces)
    }
}
