//! Overhang analysis.
//!
//! For each face, θ is the angle between its outward unit normal and +Z. The
//! face's overhang angle is `θ − 90°` clamped at 0: upward and vertical faces
//! score 0, a face pointing straight down scores 90°. A face is an overhang
//! when its overhang angle is strictly greater than the threshold.
//!
//! Percentages are taken over the total face count. Faces without a normal
//! (zero area) never count as overhangs but stay in the denominator.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Mesh;

/// Angle thresholds for overhang classification, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverhangParams {
    /// Base overhang threshold.
    pub threshold_deg: f64,
    pub severe_deg: f64,
    pub extreme_deg: f64,
    /// Face count above which per-face classification runs on rayon.
    pub parallel_threshold: usize,
}

impl Default for OverhangParams {
    fn default() -> Self {
        Self {
            threshold_deg: 45.0,
            severe_deg: 60.0,
            extreme_deg: 75.0,
            parallel_threshold: 10_000,
        }
    }
}

impl OverhangParams {
    /// Parameters with a different base threshold.
    pub fn with_threshold(threshold_deg: f64) -> Self {
        Self {
            threshold_deg,
            ..Self::default()
        }
    }
}

/// Percent cutoffs that turn overhang percentages into support decisions.
///
/// All comparisons are strict (`>`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportPolicy {
    pub has_overhangs_pct: f64,
    pub needs_supports_pct: f64,
    /// Tree support when the severe percentage exceeds this.
    pub tree_severe_pct: f64,
    /// Tree support when the base percentage exceeds `tree_combined_pct`
    /// and the extreme percentage exceeds `tree_combined_extreme_pct`.
    pub tree_combined_pct: f64,
    pub tree_combined_extreme_pct: f64,
    /// Tree support when the base percentage alone exceeds this.
    pub tree_any_pct: f64,
}

impl Default for SupportPolicy {
    fn default() -> Self {
        Self {
            has_overhangs_pct: 5.0,
            needs_supports_pct: 10.0,
            tree_severe_pct: 5.0,
            tree_combined_pct: 15.0,
            tree_combined_extreme_pct: 2.0,
            tree_any_pct: 20.0,
        }
    }
}

impl SupportPolicy {
    pub fn needs_supports(&self, overhang_pct: f64) -> bool {
        overhang_pct > self.needs_supports_pct
    }

    pub fn recommend_tree(&self, overhang_pct: f64, severe_pct: f64, extreme_pct: f64) -> bool {
        severe_pct > self.tree_severe_pct
            || (overhang_pct > self.tree_combined_pct
                && extreme_pct > self.tree_combined_extreme_pct)
            || overhang_pct > self.tree_any_pct
    }
}

/// How demanding the support structure is likely to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportComplexity {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for SupportComplexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SupportComplexity::High => "high",
            SupportComplexity::Medium => "medium",
            SupportComplexity::Low => "low",
        };
        f.write_str(s)
    }
}

/// Overhang group of a feature set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverhangMetrics {
    pub overhang_percentage: f64,
    pub severe_overhang_percentage: f64,
    pub extreme_overhang_percentage: f64,
    pub overhang_face_count: usize,
    /// Largest overhang angle over all faces, in degrees.
    pub max_overhang_angle: f64,
    pub has_overhangs: bool,
    pub needs_supports: bool,
    pub recommend_tree_support: bool,
    pub support_complexity: SupportComplexity,
    /// Faces skipped because they have no normal.
    pub degenerate_face_count: usize,
}

/// Overhang angle in degrees for a unit normal.
pub fn overhang_angle_deg(normal_z: f64) -> f64 {
    let theta = normal_z.clamp(-1.0, 1.0).acos().to_degrees();
    (theta - 90.0).max(0.0)
}

/// Per-face overhang angles; `None` for degenerate faces.
pub fn face_overhang_angles(mesh: &Mesh, parallel_threshold: usize) -> Vec<Option<f64>> {
    if mesh.face_count() > parallel_threshold {
        (0..mesh.face_count())
            .into_par_iter()
            .map(|face_idx| {
                mesh.triangle(face_idx)
                    .and_then(|tri| tri.normal())
                    .map(|n| overhang_angle_deg(n.z))
            })
            .collect()
    } else {
        mesh.face_normals()
            .into_iter()
            .map(|n| n.map(|n| overhang_angle_deg(n.z)))
            .collect()
    }
}

/// Classify every face and derive the support decisions.
pub fn analyze_overhangs(
    mesh: &Mesh,
    params: &OverhangParams,
    policy: &SupportPolicy,
) -> OverhangMetrics {
    let angles = face_overhang_angles(mesh, params.parallel_threshold);
    let total = angles.len();

    let mut base = 0usize;
    let mut severe = 0usize;
    let mut extreme = 0usize;
    let mut degenerate = 0usize;
    let mut max_angle = 0.0f64;

    for angle in &angles {
        match *angle {
            Some(a) => {
                if a > params.threshold_deg {
                    base += 1;
                }
                if a > params.severe_deg {
                    severe += 1;
                }
                if a > params.extreme_deg {
                    extreme += 1;
                }
                max_angle = max_angle.max(a);
            }
            None => degenerate += 1,
        }
    }

    let pct = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        }
    };
    let overhang_percentage = pct(base);
    let severe_overhang_percentage = pct(severe);
    let extreme_overhang_percentage = pct(extreme);

    let needs_supports = policy.needs_supports(overhang_percentage);
    let recommend_tree_support = policy.recommend_tree(
        overhang_percentage,
        severe_overhang_percentage,
        extreme_overhang_percentage,
    );
    let support_complexity = if recommend_tree_support {
        SupportComplexity::High
    } else if needs_supports {
        SupportComplexity::Medium
    } else {
        SupportComplexity::Low
    };

    debug!(
        faces = total,
        overhangs = base,
        severe,
        extreme,
        degenerate,
        threshold = params.threshold_deg,
        "Overhang classification"
    );

    OverhangMetrics {
        overhang_percentage,
        severe_overhang_percentage,
        extreme_overhang_percentage,
        overhang_face_count: base,
        max_overhang_angle: max_angle,
        has_overhangs: overhang_percentage > policy.has_overhangs_pct,
        needs_supports,
        recommend_tree_support,
        support_complexity,
        degenerate_face_count: degenerate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_meshes::cube;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn down_triangle() -> Mesh {
        // Clockwise seen from above, so the normal is -Z.
        Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap()
    }

    fn up_square() -> Mesh {
        Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_angle_convention() {
        assert_relative_eq!(overhang_angle_deg(1.0), 0.0);
        assert_relative_eq!(overhang_angle_deg(0.0), 0.0, epsilon = 1e-9);
        assert_relative_eq!(overhang_angle_deg(-1.0), 90.0);
        // 45° below horizontal
        let z = -(45.0f64.to_radians().sin());
        assert_relative_eq!(overhang_angle_deg(z), 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_straight_down_face_is_extreme() {
        let m = analyze_overhangs(
            &down_triangle(),
            &OverhangParams::default(),
            &SupportPolicy::default(),
        );
        assert_eq!(m.overhang_percentage, 100.0);
        assert_eq!(m.severe_overhang_percentage, 100.0);
        assert_eq!(m.extreme_overhang_percentage, 100.0);
        assert_eq!(m.max_overhang_angle, 90.0);
        assert!(m.needs_supports);
        assert!(m.recommend_tree_support);
        assert_eq!(m.support_complexity, SupportComplexity::High);
    }

    #[test]
    fn test_upward_square_has_none() {
        let m = analyze_overhangs(&up_square(), &OverhangParams::default(), &SupportPolicy::default());
        assert_eq!(m.overhang_percentage, 0.0);
        assert_eq!(m.overhang_face_count, 0);
        assert!(!m.has_overhangs);
        assert!(!m.needs_supports);
        assert_eq!(m.support_complexity, SupportComplexity::Low);
    }

    #[test]
    fn test_cube_bottom_is_one_sixth() {
        let m = analyze_overhangs(&cube(10.0), &OverhangParams::default(), &SupportPolicy::default());
        assert_eq!(m.overhang_face_count, 2);
        assert_relative_eq!(m.overhang_percentage, 200.0 / 12.0);
        assert!(m.needs_supports);
        // 16.7% base, 16.7% extreme, so the combined rule fires.
        assert!(m.recommend_tree_support);
    }

    #[test]
    fn test_degenerate_faces_stay_in_denominator() {
        let mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            // Second face is collinear.
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap();
        let m = analyze_overhangs(&mesh, &OverhangParams::default(), &SupportPolicy::default());
        assert_eq!(m.degenerate_face_count, 1);
        assert_eq!(m.overhang_percentage, 50.0);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let mesh = cube(3.0);
        let serial = face_overhang_angles(&mesh, usize::MAX);
        let parallel = face_overhang_angles(&mesh, 0);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_tree_policy_rules() {
        let p = SupportPolicy::default();
        assert!(p.recommend_tree(0.0, 5.1, 0.0));
        assert!(p.recommend_tree(15.1, 0.0, 2.1));
        assert!(!p.recommend_tree(15.1, 0.0, 2.0));
        assert!(p.recommend_tree(20.1, 0.0, 0.0));
        assert!(!p.recommend_tree(20.0, 5.0, 2.0));
    }
}
