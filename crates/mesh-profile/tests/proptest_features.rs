//! Property-based tests for feature extraction and placement.
//!
//! Run with: cargo test -p mesh-profile -- proptest

use mesh_profile::{
    BoundingBox, BuildPlate, FeatureParams, Mesh, OverhangParams, extract_features, fingerprint,
    solve_placement,
};
use nalgebra::Point3;
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_position() -> impl Strategy<Value = Point3<f64>> {
    prop::array::uniform3(-100.0..100.0f64).prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// A mesh with valid indices; faces may be degenerate.
fn arb_mesh(max_vertices: usize, max_faces: usize) -> impl Strategy<Value = Mesh> {
    (3..=max_vertices).prop_flat_map(move |n| {
        let vertices = prop::collection::vec(arb_position(), n);
        let faces = prop::collection::vec(prop::array::uniform3(0..n as u32), 1..=max_faces);
        (vertices, faces).prop_map(|(v, f)| Mesh::from_parts(v, f).unwrap())
    })
}

fn arb_bounds() -> impl Strategy<Value = BoundingBox> {
    (arb_position(), prop::array::uniform3(0.0..1000.0f64)).prop_map(|(min, [w, d, h])| {
        BoundingBox::new(min, Point3::new(min.x + w, min.y + d, min.z + h))
    })
}

// =============================================================================
// Extraction
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn proptest_extraction_is_deterministic(mesh in arb_mesh(30, 60)) {
        let params = FeatureParams::default();
        let a = extract_features(&mesh, &params);
        let b = extract_features(&mesh, &params);
        prop_assert_eq!(a.to_json_pretty().unwrap(), b.to_json_pretty().unwrap());
        prop_assert_eq!(a.fingerprint, fingerprint(&mesh));
    }

    #[test]
    fn proptest_features_are_finite(mesh in arb_mesh(30, 60)) {
        let f = extract_features(&mesh, &FeatureParams::default());
        for v in [
            f.volume,
            f.surface_area,
            f.complexity.face_density,
            f.overhangs.overhang_percentage,
            f.overhangs.severe_overhang_percentage,
            f.overhangs.extreme_overhang_percentage,
            f.overhangs.max_overhang_angle,
            f.surface.mean_face_area,
            f.surface.surface_variation,
            f.wall_analysis.estimated_min_wall_thickness,
        ] {
            prop_assert!(v.is_finite());
        }
        prop_assert!(f.overhangs.overhang_percentage <= 100.0);
        prop_assert!(f.overhangs.severe_overhang_percentage <= f.overhangs.overhang_percentage);
        prop_assert!(f.overhangs.extreme_overhang_percentage <= f.overhangs.severe_overhang_percentage);
    }

    #[test]
    fn proptest_overhang_monotone_in_threshold(
        mesh in arb_mesh(20, 40),
        lo in 0.0..89.0f64,
        delta in 0.0..45.0f64,
    ) {
        let hi = (lo + delta).min(89.9);
        let at = |t: f64| {
            let params = FeatureParams { overhang: OverhangParams::with_threshold(t), ..FeatureParams::default() };
            extract_features(&mesh, &params).overhangs.overhang_percentage
        };
        prop_assert!(at(hi) <= at(lo));
    }

    #[test]
    fn proptest_fingerprint_detects_translation(mesh in arb_mesh(10, 20), dz in 0.5..10.0f64) {
        let (vertices, faces) = mesh.clone().into_parts();
        let moved = Mesh::from_parts(
            vertices.iter().map(|p| Point3::new(p.x, p.y, p.z + dz)).collect(),
            faces,
        ).unwrap();
        prop_assert_ne!(fingerprint(&mesh), fingerprint(&moved));
    }
}

// =============================================================================
// Placement
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn proptest_placement_fits_plate(
        bounds in arb_bounds(),
        width in 50.0..400.0f64,
        depth in 50.0..400.0f64,
        margin in 0.0..20.0f64,
    ) {
        let plate = BuildPlate::new(width, depth);
        let t = solve_placement(&bounds, &plate, margin).unwrap();
        prop_assert!(t.scale > 0.0 && t.scale <= 1.0);

        // Place the re-centered footprint and check it sits in the safe area.
        let e = bounds.extents();
        let local = BoundingBox::new(
            Point3::new(-e.x / 2.0, -e.y / 2.0, 0.0),
            Point3::new(e.x / 2.0, e.y / 2.0, e.z),
        );
        let placed = t.apply_bounds(&local);
        let eps = 1e-9;
        prop_assert!(placed.min.x >= margin - eps);
        prop_assert!(placed.min.y >= margin - eps);
        prop_assert!(placed.max.x <= width - margin + eps);
        prop_assert!(placed.max.y <= depth - margin + eps);
        prop_assert!(placed.min.z.abs() < eps);
    }

    #[test]
    fn proptest_small_models_are_not_scaled(
        w in 0.0..100.0f64,
        d in 0.0..100.0f64,
        h in 0.0..300.0f64,
    ) {
        let bounds = BoundingBox::new(Point3::origin(), Point3::new(w, d, h));
        let t = solve_placement(&bounds, &BuildPlate::square(220.0), 5.0).unwrap();
        prop_assert_eq!(t.scale, 1.0);
    }
}
