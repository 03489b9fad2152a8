//! Feature extraction.
//!
//! [`extract_features`] is a pure function of the mesh and the parameters:
//! the same input always yields the same [`FeatureSet`], and every float in
//! it is finite. Values that would be NaN or infinite (zero-area meshes, for
//! instance) are clamped to 0 and a [`GeometryWarning`] is recorded instead.
//!
//! # Example
//!
//! ```
//! use mesh_profile::{extract_features, FeatureParams, Mesh};
//! use nalgebra::Point3;
//!
//! let mesh = Mesh::from_parts(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(10.0, 0.0, 0.0),
//!         Point3::new(0.0, 10.0, 0.0),
//!     ],
//!     vec![[0, 1, 2]],
//! )
//! .unwrap();
//!
//! let features = extract_features(&mesh, &FeatureParams::default());
//! assert_eq!(features.face_count, 1);
//! assert!(!features.overhangs.needs_supports);
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::complexity::{ComplexityMetrics, DetailThresholds, analyze_complexity};
use crate::error::GeometryWarning;
use crate::fingerprint::fingerprint;
use crate::measure::{Dimensions, dimensions};
use crate::overhang::{OverhangMetrics, OverhangParams, SupportPolicy, analyze_overhangs};
use crate::printability::{
    OrientationHint, SurfaceMetrics, WallEstimate, WallParams, analyze_surface, estimate_walls,
    suggest_orientation,
};
use crate::tracing_ext::{OperationTimer, log_feature_summary};
use crate::types::Mesh;

/// All tunable thresholds of the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    pub detail: DetailThresholds,
    pub overhang: OverhangParams,
    pub support: SupportPolicy,
    pub wall: WallParams,
}

/// Axis-aligned bounds in summary form.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundsSummary {
    pub extents: [f64; 3],
    /// Area-weighted surface centroid, not the box center.
    pub center: [f64; 3],
}

/// Geometric features of one mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Hex SHA-256 of the vertex and face buffers.
    pub fingerprint: String,
    pub volume: f64,
    pub surface_area: f64,
    pub vertex_count: usize,
    pub face_count: usize,
    pub bounding_box: BoundsSummary,
    pub dimensions: Dimensions,
    pub complexity: ComplexityMetrics,
    pub overhangs: OverhangMetrics,
    pub wall_analysis: WallEstimate,
    pub surface: SurfaceMetrics,
    pub orientation: OrientationHint,
    #[serde(default)]
    pub warnings: Vec<GeometryWarning>,
}

/// Replace a non-finite value with 0, recording a warning.
fn finite(value: f64, field: &str, warnings: &mut Vec<GeometryWarning>) -> f64 {
    if value.is_finite() {
        value
    } else {
        warnings.push(GeometryWarning::NonFiniteValue {
            field: field.to_string(),
        });
        0.0
    }
}

/// Extract the full feature set of a mesh.
pub fn extract_features(mesh: &Mesh, params: &FeatureParams) -> FeatureSet {
    let _timer = OperationTimer::for_mesh("extract_features", mesh);
    let mut warnings = Vec::new();

    let face_areas = mesh.face_areas();
    let surface_area = finite(face_areas.iter().sum(), "surface_area", &mut warnings);
    let volume = finite(mesh.volume(), "volume", &mut warnings);

    if surface_area <= 0.0 {
        warnings.push(GeometryWarning::ZeroSurfaceArea);
    }
    if volume < 1e-12 {
        warnings.push(GeometryWarning::ZeroVolume);
    }

    let bounding_box = mesh
        .bounds()
        .map(|b| {
            let e = b.extents();
            let c = mesh.centroid().unwrap_or_else(|| b.center());
            BoundsSummary {
                extents: [e.x, e.y, e.z],
                center: [c.x, c.y, c.z],
            }
        })
        .unwrap_or_default();

    let dims = dimensions(mesh);
    let complexity = analyze_complexity(mesh, surface_area, &params.detail);
    if complexity.non_manifold_edges > 0 {
        warnings.push(GeometryWarning::NonManifoldEdges {
            count: complexity.non_manifold_edges,
        });
    }
    let overhangs = analyze_overhangs(mesh, &params.overhang, &params.support);
    if overhangs.degenerate_face_count > 0 {
        warnings.push(GeometryWarning::DegenerateFaces {
            count: overhangs.degenerate_face_count,
        });
    }

    let mut surface = analyze_surface(&face_areas);
    surface.mean_face_area = finite(surface.mean_face_area, "surface.mean_face_area", &mut warnings);
    surface.surface_variation =
        finite(surface.surface_variation, "surface.surface_variation", &mut warnings);

    for w in &warnings {
        warn!(code = w.code(), "{}", w);
    }

    let features = FeatureSet {
        fingerprint: fingerprint(mesh),
        volume,
        surface_area,
        vertex_count: mesh.vertex_count(),
        face_count: mesh.face_count(),
        bounding_box,
        dimensions: dims,
        complexity,
        overhangs,
        wall_analysis: estimate_walls(&dims, &params.wall),
        surface,
        orientation: suggest_orientation(&dims),
        warnings,
    };
    log_feature_summary(&features);
    features
}

impl FeatureSet {
    /// Multi-line human-readable summary.
    pub fn summary(&self) -> String {
        let d = &self.dimensions;
        let oh = &self.overhangs;
        let mut lines = vec![
            format!(
                "Dimensions: {:.1}mm × {:.1}mm × {:.1}mm",
                d.width, d.depth, d.height
            ),
            format!("Volume: {:.2} mm³", self.volume),
            format!("Detail Level: {}", self.complexity.detail_level),
            format!(
                "Watertight: {}",
                if self.complexity.is_watertight { "Yes" } else { "No" }
            ),
        ];

        if oh.needs_supports {
            let kind = if oh.recommend_tree_support {
                "Tree Supports recommended"
            } else {
                "Normal Supports"
            };
            lines.push(format!(
                "Needs Supports ({:.1}% overhangs)",
                oh.overhang_percentage
            ));
            lines.push(format!("   -> {} (complexity: {})", kind, oh.support_complexity));
        } else {
            lines.push("No significant overhangs".to_string());
        }

        lines.push(format!("Wall Type: {}", self.wall_analysis.wall_type));
        lines.join("\n")
    }

    /// Text sent to the similarity store as a query.
    pub fn search_text(&self) -> String {
        self.search_parts().join(" | ")
    }

    pub(crate) fn search_parts(&self) -> Vec<String> {
        let d = &self.dimensions;
        let mut parts = vec![
            format!("Dimensions: {:.1}x{:.1}x{:.1}mm", d.width, d.depth, d.height),
            format!("Detail level: {}", self.complexity.detail_level),
            format!("Watertight: {}", self.complexity.is_watertight),
        ];
        if self.overhangs.needs_supports {
            parts.push(format!(
                "Needs supports: {:.1}% overhangs",
                self.overhangs.overhang_percentage
            ));
        }
        parts
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::DetailLevel;
    use crate::printability::{Axis, WallType};
    use crate::types::test_meshes::{cube, cube_at};
    use nalgebra::Point3;

    #[test]
    fn test_cube_features() {
        let f = extract_features(&cube(10.0), &FeatureParams::default());
        assert_eq!(f.vertex_count, 8);
        assert_eq!(f.face_count, 12);
        assert!((f.volume - 1000.0).abs() < 1e-9);
        assert!((f.surface_area - 600.0).abs() < 1e-9);
        assert_eq!(f.bounding_box.extents, [10.0, 10.0, 10.0]);
        for c in f.bounding_box.center {
            assert!((c - 5.0).abs() < 1e-9);
        }
        assert!(f.complexity.is_watertight);
        assert_eq!(f.complexity.detail_level, DetailLevel::Low);
        assert_eq!(f.wall_analysis.wall_type, WallType::Thick);
        assert_eq!(f.orientation.suggested_up_axis, Axis::Z);
        assert!(f.warnings.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let mesh = cube_at([3.0, -2.0, 1.0], 7.5);
        let params = FeatureParams::default();
        assert_eq!(extract_features(&mesh, &params), extract_features(&mesh, &params));
    }

    #[test]
    fn test_zero_area_mesh_is_finite_with_warnings() {
        let mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let f = extract_features(&mesh, &FeatureParams::default());
        assert_eq!(f.surface_area, 0.0);
        assert_eq!(f.complexity.face_density, 0.0);
        assert_eq!(f.surface.surface_variation, 0.0);
        assert!(f.warnings.contains(&GeometryWarning::ZeroSurfaceArea));
        assert!(f.warnings.contains(&GeometryWarning::DegenerateFaces { count: 1 }));

        let json = f.to_json_pretty().unwrap();
        assert!(!json.contains("NaN"));
    }

    #[test]
    fn test_fin_records_non_manifold_warning() {
        let mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, -1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]],
        )
        .unwrap();
        let f = extract_features(&mesh, &FeatureParams::default());
        assert_eq!(f.complexity.non_manifold_edges, 1);
        assert!(f.warnings.contains(&GeometryWarning::NonManifoldEdges { count: 1 }));
        assert_eq!(GeometryWarning::NonManifoldEdges { count: 1 }.code(), "PROF-2105");
    }

    #[test]
    fn test_summary_and_search_text() {
        let f = extract_features(&cube(10.0), &FeatureParams::default());
        let summary = f.summary();
        assert!(summary.starts_with("Dimensions: 10.0mm × 10.0mm × 10.0mm"));
        assert!(summary.contains("Watertight: Yes"));
        assert!(summary.contains("Tree Supports recommended"));

        assert_eq!(
            f.search_text(),
            "Dimensions: 10.0x10.0x10.0mm | Detail level: low | Watertight: true | Needs supports: 16.7% overhangs"
        );
    }

    #[test]
    fn test_threshold_is_configurable() {
        let mut params = FeatureParams::default();
        params.overhang = OverhangParams::with_threshold(89.0);
        let f = extract_features(&cube(10.0), &params);
        assert_eq!(f.overhangs.overhang_face_count, 2);

        params.overhang = OverhangParams::with_threshold(90.0);
        let f = extract_features(&cube(10.0), &params);
        assert_eq!(f.overhangs.overhang_face_count, 0);
    }
}
