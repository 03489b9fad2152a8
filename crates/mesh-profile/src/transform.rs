//! Build-plate placement.
//!
//! A mesh is first re-centered ([`Mesh::centered`]: X/Y around the bounding
//! box center, Z starting at 0). [`solve_placement`] then finds the uniform
//! scale that fits the footprint inside the plate's safe area and the
//! translation that puts it in the middle of the plate.

use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProfileError, ProfileResult};
use crate::types::{BoundingBox, Mesh};

/// A rectangular build plate, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildPlate {
    pub width: f64,
    pub depth: f64,
}

impl BuildPlate {
    pub fn new(width: f64, depth: f64) -> Self {
        Self { width, depth }
    }

    pub fn square(size: f64) -> Self {
        Self::new(size, size)
    }
}

impl Default for BuildPlate {
    fn default() -> Self {
        Self::square(220.0)
    }
}

/// Uniform scale followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    /// In `(0, 1]`.
    pub scale: f64,
    pub translation: Vector3<f64>,
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            translation: Vector3::zeros(),
        }
    }

    pub fn apply(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(p.coords * self.scale + self.translation)
    }

    /// Transformed bounds. Exact because the scale is positive and uniform.
    pub fn apply_bounds(&self, bounds: &BoundingBox) -> BoundingBox {
        BoundingBox::new(self.apply(&bounds.min), self.apply(&bounds.max))
    }

    /// The 12-number 3MF `transform` attribute: the three rows of the 3x3
    /// linear part followed by the translation.
    pub fn to_3mf_matrix(&self) -> String {
        let s = self.scale;
        let t = &self.translation;
        [s, 0.0, 0.0, 0.0, s, 0.0, 0.0, 0.0, s, t.x, t.y, t.z]
            .iter()
            .map(|v| format_number(*v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Row-major 4x4 homogeneous matrix.
    pub fn to_row_major_4x4(&self) -> [f64; 16] {
        let m = self.to_matrix();
        let mut out = [0.0; 16];
        for r in 0..4 {
            for c in 0..4 {
                out[r * 4 + c] = m[(r, c)];
            }
        }
        out
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&self.translation) * Matrix4::new_scaling(self.scale)
    }
}

/// Shortest decimal form: integers without a fraction, otherwise up to six
/// decimals with trailing zeros removed.
pub(crate) fn format_number(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        // Avoid "-0".
        return format!("{}", v as i64);
    }
    let s = format!("{:.6}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Solve the placement of a mesh with the given (original, un-centered)
/// bounds on a plate, keeping `margin` mm clear on every side.
///
/// The scale is `min(1, safe_w / w, safe_d / d)`; zero extents impose no
/// limit. The translation is the plate center at Z = 0 and applies to
/// re-centered geometry.
pub fn solve_placement(
    bounds: &BoundingBox,
    plate: &BuildPlate,
    margin: f64,
) -> ProfileResult<AffineTransform> {
    if !(plate.width.is_finite() && plate.width > 0.0) {
        return Err(ProfileError::invalid_parameter(
            "plate_width",
            plate.width,
            "must be positive",
        ));
    }
    if !(plate.depth.is_finite() && plate.depth > 0.0) {
        return Err(ProfileError::invalid_parameter(
            "plate_depth",
            plate.depth,
            "must be positive",
        ));
    }
    if !(margin.is_finite() && margin >= 0.0) {
        return Err(ProfileError::invalid_parameter(
            "margin",
            margin,
            "must be zero or positive",
        ));
    }

    let safe_w = plate.width - 2.0 * margin;
    let safe_d = plate.depth - 2.0 * margin;
    if safe_w <= 0.0 || safe_d <= 0.0 {
        return Err(ProfileError::invalid_placement(format!(
            "margin {} leaves no usable area on a {}x{} plate",
            margin, plate.width, plate.depth
        )));
    }

    let extents = bounds.extents();
    let mut scale = 1.0f64;
    if extents.x > 0.0 {
        scale = scale.min(safe_w / extents.x);
    }
    if extents.y > 0.0 {
        scale = scale.min(safe_d / extents.y);
    }

    let transform = AffineTransform {
        scale,
        translation: Vector3::new(plate.width / 2.0, plate.depth / 2.0, 0.0),
    };

    if scale < 1.0 {
        info!(
            scale = format!("{:.4}", scale),
            width = extents.x,
            depth = extents.y,
            "Model scaled down to fit build plate"
        );
    }
    debug!(matrix = %transform.to_3mf_matrix(), "Placement solved");
    Ok(transform)
}

impl Mesh {
    /// Solve this mesh's placement on a plate.
    pub fn solve_placement(&self, plate: &BuildPlate, margin: f64) -> ProfileResult<AffineTransform> {
        let bounds = self.bounds().ok_or(ProfileError::EmptyGeometry)?;
        solve_placement(&bounds, plate, margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_meshes::{cube, cube_at};
    use approx::assert_relative_eq;

    fn bbox(w: f64, d: f64, h: f64) -> BoundingBox {
        BoundingBox::new(Point3::origin(), Point3::new(w, d, h))
    }

    #[test]
    fn test_small_cube_not_scaled() {
        let t = solve_placement(&bbox(10.0, 10.0, 10.0), &BuildPlate::square(220.0), 5.0).unwrap();
        assert_eq!(t.scale, 1.0);
        assert_eq!(t.translation, Vector3::new(110.0, 110.0, 0.0));
        assert_eq!(t.to_3mf_matrix(), "1 0 0 0 1 0 0 0 1 110 110 0");
    }

    #[test]
    fn test_oversized_model_scaled() {
        let t = solve_placement(&bbox(300.0, 100.0, 50.0), &BuildPlate::square(220.0), 5.0).unwrap();
        assert_relative_eq!(t.scale, 0.7);
    }

    #[test]
    fn test_height_does_not_limit_scale() {
        let t = solve_placement(&bbox(10.0, 10.0, 500.0), &BuildPlate::square(220.0), 5.0).unwrap();
        assert_eq!(t.scale, 1.0);
    }

    #[test]
    fn test_rectangular_plate() {
        let t = solve_placement(&bbox(100.0, 100.0, 10.0), &BuildPlate::new(300.0, 90.0), 5.0).unwrap();
        assert_relative_eq!(t.scale, 0.8);
        assert_eq!(t.translation, Vector3::new(150.0, 45.0, 0.0));
    }

    #[test]
    fn test_margin_consumes_plate() {
        let err = solve_placement(&bbox(1.0, 1.0, 1.0), &BuildPlate::square(10.0), 5.0).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidPlacement { .. }));

        let err = solve_placement(&bbox(1.0, 1.0, 1.0), &BuildPlate::square(-1.0), 0.0).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidParameter { name: "plate_width", .. }));
    }

    #[test]
    fn test_placed_centered_mesh_fits() {
        let mesh = cube_at([-400.0, 30.0, 12.0], 250.0);
        let plate = BuildPlate::square(220.0);
        let t = mesh.solve_placement(&plate, 5.0).unwrap();
        let placed = t.apply_bounds(&mesh.centered().bounds().unwrap());
        assert!(placed.min.x >= 5.0 - 1e-9 && placed.max.x <= 215.0 + 1e-9);
        assert!(placed.min.y >= 5.0 - 1e-9 && placed.max.y <= 215.0 + 1e-9);
        assert_relative_eq!(placed.min.z, 0.0);
    }

    #[test]
    fn test_matrix_forms() {
        let t = AffineTransform {
            scale: 0.7,
            translation: Vector3::new(110.0, 110.0, 0.0),
        };
        assert_eq!(t.to_3mf_matrix(), "0.7 0 0 0 0.7 0 0 0 0.7 110 110 0");
        let m = t.to_row_major_4x4();
        assert_eq!(m[0], 0.7);
        assert_eq!(m[3], 110.0);
        assert_eq!(m[7], 110.0);
        assert_eq!(m[15], 1.0);

        let p = t.apply(&Point3::new(10.0, 0.0, 1.0));
        assert_relative_eq!(p.x, 117.0);
        assert_relative_eq!(p.z, 0.7);
        assert_eq!(cube(1.0).solve_placement(&BuildPlate::default(), 5.0).unwrap().scale, 1.0);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.125), "0.125");
        assert_eq!(format_number(1.0 / 3.0), "0.333333");
    }
}
