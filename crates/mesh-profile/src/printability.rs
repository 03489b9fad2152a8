//! Wall, surface, and orientation heuristics.

use serde::{Deserialize, Serialize};

use crate::measure::Dimensions;

/// Wall-thickness estimate parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallParams {
    /// Fraction of the mean extent used as the wall estimate.
    pub thickness_factor: f64,
    /// Mean extent (mm) below which walls are considered thin.
    pub thin_cutoff_mm: f64,
}

impl Default for WallParams {
    fn default() -> Self {
        Self {
            thickness_factor: 0.01,
            thin_cutoff_mm: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallType {
    Thin,
    Thick,
}

impl std::fmt::Display for WallType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WallType::Thin => "thin",
            WallType::Thick => "thick",
        })
    }
}

/// Wall group of a feature set.
///
/// This is a size heuristic, not a ray-cast thickness measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallEstimate {
    pub estimated_min_wall_thickness: f64,
    pub has_thin_walls: bool,
    pub wall_type: WallType,
}

pub fn estimate_walls(dims: &Dimensions, params: &WallParams) -> WallEstimate {
    let mean = dims.mean();
    let has_thin_walls = mean < params.thin_cutoff_mm;
    WallEstimate {
        estimated_min_wall_thickness: mean * params.thickness_factor,
        has_thin_walls,
        wall_type: if has_thin_walls {
            WallType::Thin
        } else {
            WallType::Thick
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceType {
    Smooth,
    Detailed,
}

impl std::fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SurfaceType::Smooth => "smooth",
            SurfaceType::Detailed => "detailed",
        })
    }
}

/// Surface group of a feature set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMetrics {
    pub mean_face_area: f64,
    /// Coefficient of variation of face areas.
    pub surface_variation: f64,
    pub surface_type: SurfaceType,
}

/// Coefficient-of-variation cutoff between smooth and detailed surfaces.
pub const SMOOTH_VARIATION_CUTOFF: f64 = 0.5;

/// Surface metrics from per-face areas. Population standard deviation; the
/// variation is 0 when the mean area is 0.
pub fn analyze_surface(face_areas: &[f64]) -> SurfaceMetrics {
    if face_areas.is_empty() {
        return SurfaceMetrics {
            mean_face_area: 0.0,
            surface_variation: 0.0,
            surface_type: SurfaceType::Smooth,
        };
    }

    let n = face_areas.len() as f64;
    let mean = face_areas.iter().sum::<f64>() / n;
    let variance = face_areas.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
    let variation = if mean > 0.0 {
        variance.sqrt() / mean
    } else {
        0.0
    };

    SurfaceMetrics {
        mean_face_area: mean,
        surface_variation: variation,
        surface_type: if variation < SMOOTH_VARIATION_CUTOFF {
            SurfaceType::Smooth
        } else {
            SurfaceType::Detailed
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn from_index(i: usize) -> Self {
        match i {
            0 => Axis::X,
            1 => Axis::Y,
            _ => Axis::Z,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationAdvice {
    ModelPositionedOptimally,
    RotationRecommended,
}

impl std::fmt::Display for RotationAdvice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RotationAdvice::ModelPositionedOptimally => "already optimal",
            RotationAdvice::RotationRecommended => "rotation recommended",
        })
    }
}

/// Orientation group of a feature set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationHint {
    /// Axis with the shortest extent.
    pub suggested_base_axis: Axis,
    /// Axis with the longest extent.
    pub suggested_up_axis: Axis,
    /// Current Z extent.
    pub current_height: f64,
    pub optimal_rotation: RotationAdvice,
}

/// Rank the extents. Ties keep axis order (X before Y before Z).
pub fn suggest_orientation(dims: &Dimensions) -> OrientationHint {
    let extents = dims.as_array();
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| extents[a].total_cmp(&extents[b]));

    let up = order[2];
    OrientationHint {
        suggested_base_axis: Axis::from_index(order[0]),
        suggested_up_axis: Axis::from_index(up),
        current_height: dims.height,
        optimal_rotation: if up == 2 {
            RotationAdvice::ModelPositionedOptimally
        } else {
            RotationAdvice::RotationRecommended
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(w: f64, d: f64, h: f64) -> Dimensions {
        Dimensions {
            width: w,
            depth: d,
            height: h,
            max_dimension: w.max(d).max(h),
            min_dimension: w.min(d).min(h),
        }
    }

    #[test]
    fn test_wall_estimate() {
        let w = estimate_walls(&dims(10.0, 20.0, 30.0), &WallParams::default());
        assert!((w.estimated_min_wall_thickness - 0.2).abs() < 1e-12);
        assert!(!w.has_thin_walls);
        assert_eq!(w.wall_type, WallType::Thick);

        let w = estimate_walls(&dims(5.0, 5.0, 5.0), &WallParams::default());
        assert!(w.has_thin_walls);
        assert_eq!(w.wall_type, WallType::Thin);
    }

    #[test]
    fn test_uniform_surface_is_smooth() {
        let s = analyze_surface(&[2.0; 12]);
        assert_eq!(s.mean_face_area, 2.0);
        assert_eq!(s.surface_variation, 0.0);
        assert_eq!(s.surface_type, SurfaceType::Smooth);
    }

    #[test]
    fn test_varied_surface_is_detailed() {
        // mean 2.5, population std 2.5
        let s = analyze_surface(&[0.0, 5.0]);
        assert!((s.surface_variation - 1.0).abs() < 1e-12);
        assert_eq!(s.surface_type, SurfaceType::Detailed);
    }

    #[test]
    fn test_zero_area_surface() {
        let s = analyze_surface(&[0.0, 0.0]);
        assert_eq!(s.surface_variation, 0.0);
        assert!(analyze_surface(&[]).mean_face_area == 0.0);
    }

    #[test]
    fn test_tall_model_is_positioned() {
        let o = suggest_orientation(&dims(10.0, 20.0, 50.0));
        assert_eq!(o.suggested_up_axis, Axis::Z);
        assert_eq!(o.suggested_base_axis, Axis::X);
        assert_eq!(o.current_height, 50.0);
        assert_eq!(o.optimal_rotation, RotationAdvice::ModelPositionedOptimally);
    }

    #[test]
    fn test_flat_model_needs_rotation() {
        let o = suggest_orientation(&dims(80.0, 20.0, 5.0));
        assert_eq!(o.suggested_up_axis, Axis::X);
        assert_eq!(o.suggested_base_axis, Axis::Z);
        assert_eq!(o.optimal_rotation, RotationAdvice::RotationRecommended);
    }

    #[test]
    fn test_cube_ties_keep_axis_order() {
        let o = suggest_orientation(&dims(10.0, 10.0, 10.0));
        assert_eq!(o.suggested_base_axis, Axis::X);
        assert_eq!(o.suggested_up_axis, Axis::Z);
        assert_eq!(o.optimal_rotation, RotationAdvice::ModelPositionedOptimally);
    }
}
