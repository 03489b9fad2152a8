//! Complexity metrics: face density, topology, and detail level.

use serde::{Deserialize, Serialize};

use crate::types::Mesh;

/// Face-density cutoffs (faces per mm²) for [`DetailLevel`].
///
/// A density strictly greater than a cutoff selects that level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetailThresholds {
    #[serde(default = "DetailThresholds::default_very_high")]
    pub very_high: f64,
    #[serde(default = "DetailThresholds::default_high")]
    pub high: f64,
    #[serde(default = "DetailThresholds::default_medium")]
    pub medium: f64,
}

impl DetailThresholds {
    pub const VERY_HIGH: f64 = 100.0;
    pub const HIGH: f64 = 50.0;
    pub const MEDIUM: f64 = 20.0;

    fn default_very_high() -> f64 {
        Self::VERY_HIGH
    }
    fn default_high() -> f64 {
        Self::HIGH
    }
    fn default_medium() -> f64 {
        Self::MEDIUM
    }

    /// Classify a face density.
    pub fn classify(&self, face_density: f64) -> DetailLevel {
        if face_density > self.very_high {
            DetailLevel::VeryHigh
        } else if face_density > self.high {
            DetailLevel::High
        } else if face_density > self.medium {
            DetailLevel::Medium
        } else {
            DetailLevel::Low
        }
    }
}

impl Default for DetailThresholds {
    fn default() -> Self {
        Self {
            very_high: Self::VERY_HIGH,
            high: Self::HIGH,
            medium: Self::MEDIUM,
        }
    }
}

/// Four-bucket detail classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::VeryHigh => "very_high",
            DetailLevel::High => "high",
            DetailLevel::Medium => "medium",
            DetailLevel::Low => "low",
        }
    }
}

impl std::fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complexity group of a feature set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    /// Faces per mm² of surface; 0 when the surface area is 0.
    pub face_density: f64,
    pub is_watertight: bool,
    pub has_holes: bool,
    /// Edges used by a single face.
    #[serde(default)]
    pub boundary_edges: usize,
    /// Edges shared by more than two faces.
    #[serde(default)]
    pub non_manifold_edges: usize,
    pub euler_number: i64,
    pub detail_level: DetailLevel,
}

/// Compute complexity metrics. `surface_area` is passed in so callers that
/// already have it do not recompute it.
pub fn analyze_complexity(
    mesh: &Mesh,
    surface_area: f64,
    thresholds: &DetailThresholds,
) -> ComplexityMetrics {
    let face_density = if surface_area > 0.0 {
        mesh.face_count() as f64 / surface_area
    } else {
        0.0
    };
    let is_watertight = mesh.is_watertight();
    let edges = mesh.edge_map();

    ComplexityMetrics {
        face_density,
        is_watertight,
        has_holes: !is_watertight,
        boundary_edges: edges.boundary_edges().count(),
        non_manifold_edges: edges.non_manifold_edges().count(),
        euler_number: mesh.euler_characteristic(),
        detail_level: thresholds.classify(face_density),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_meshes::cube;

    #[test]
    fn test_classification_boundaries() {
        let t = DetailThresholds::default();
        assert_eq!(t.classify(100.5), DetailLevel::VeryHigh);
        assert_eq!(t.classify(100.0), DetailLevel::High);
        assert_eq!(t.classify(50.0), DetailLevel::Medium);
        assert_eq!(t.classify(20.0), DetailLevel::Low);
        assert_eq!(t.classify(0.0), DetailLevel::Low);
    }

    #[test]
    fn test_custom_thresholds() {
        let t = DetailThresholds {
            very_high: 10.0,
            high: 5.0,
            medium: 1.0,
        };
        assert_eq!(t.classify(6.0), DetailLevel::High);
    }

    #[test]
    fn test_small_cube_density() {
        // 12 faces over 6 mm² of surface
        let mesh = cube(1.0);
        let metrics = analyze_complexity(&mesh, mesh.surface_area(), &DetailThresholds::default());
        assert!((metrics.face_density - 2.0).abs() < 1e-12);
        assert!(metrics.is_watertight);
        assert!(!metrics.has_holes);
        assert_eq!(metrics.boundary_edges, 0);
        assert_eq!(metrics.non_manifold_edges, 0);
        assert_eq!(metrics.euler_number, 2);
        assert_eq!(metrics.detail_level, DetailLevel::Low);
    }

    #[test]
    fn test_open_and_fin_edges_counted() {
        use nalgebra::Point3;

        // Three triangles hinged on the edge 0-1.
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
        let metrics = analyze_complexity(&mesh, mesh.surface_area(), &DetailThresholds::default());
        assert!(!metrics.is_watertight);
        assert!(metrics.has_holes);
        assert_eq!(metrics.non_manifold_edges, 1);
        assert_eq!(metrics.boundary_edges, 6);
    }

    #[test]
    fn test_zero_area_density_is_zero() {
        let mesh = cube(1.0);
        let metrics = analyze_complexity(&mesh, 0.0, &DetailThresholds::default());
        assert_eq!(metrics.face_density, 0.0);
    }

    #[test]
    fn test_detail_level_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DetailLevel::VeryHigh).unwrap(),
            "\"very_high\""
        );
    }
}
