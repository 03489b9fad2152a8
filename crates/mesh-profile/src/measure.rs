//! Bounding-box dimensions.

use serde::{Deserialize, Serialize};

use crate::types::Mesh;

/// Extents of a mesh along each axis, in millimeters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// X extent.
    pub width: f64,
    /// Y extent.
    pub depth: f64,
    /// Z extent.
    pub height: f64,
    pub max_dimension: f64,
    pub min_dimension: f64,
}

impl Dimensions {
    /// Extents as `[x, y, z]`.
    pub fn as_array(&self) -> [f64; 3] {
        [self.width, self.depth, self.height]
    }

    /// Mean of the three extents.
    pub fn mean(&self) -> f64 {
        (self.width + self.depth + self.height) / 3.0
    }
}

/// Compute the bounding-box dimensions of a mesh. All zeros for an empty mesh.
pub fn dimensions(mesh: &Mesh) -> Dimensions {
    let Some(bounds) = mesh.bounds() else {
        return Dimensions::default();
    };
    let e = bounds.extents();
    Dimensions {
        width: e.x,
        depth: e.y,
        height: e.z,
        max_dimension: e.x.max(e.y).max(e.z),
        min_dimension: e.x.min(e.y).min(e.z),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_meshes::cube_at;
    use nalgebra::Point3;

    #[test]
    fn test_box_dimensions() {
        let vertices = vec![
            Point3::new(-5.0, 0.0, 1.0),
            Point3::new(15.0, 4.0, 1.0),
            Point3::new(0.0, 2.0, 31.0),
        ];
        let mesh = Mesh::from_parts(vertices, vec![[0, 1, 2]]).unwrap();
        let d = dimensions(&mesh);
        assert_eq!(d.as_array(), [20.0, 4.0, 30.0]);
        assert_eq!(d.max_dimension, 30.0);
        assert_eq!(d.min_dimension, 4.0);
        assert_eq!(d.mean(), 18.0);
    }

    #[test]
    fn test_translation_invariant() {
        let a = dimensions(&cube_at([0.0, 0.0, 0.0], 3.0));
        let b = dimensions(&cube_at([-40.0, 12.0, 9.0], 3.0));
        assert_eq!(a, b);
    }
}
