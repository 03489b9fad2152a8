//! Human-readable report and the reference profile document.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::features::FeatureSet;
use crate::recommend::Recommendation;

const WIDTH: usize = 70;

/// Render the plain-text summary for one job.
pub fn render_report(
    features: &FeatureSet,
    rec: &Recommendation,
    generated_at: DateTime<Utc>,
) -> String {
    let heavy = "=".repeat(WIDTH);
    let light = "-".repeat(WIDTH);
    let mut out = String::with_capacity(4096);

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "3D PRINTING PROFILE SUMMARY");
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Model fingerprint: {}", features.fingerprint);
    let _ = writeln!(out);

    let analysis = &rec.analysis;
    let _ = writeln!(out, "ANALYSIS");
    let _ = writeln!(out, "{light}");
    let _ = writeln!(out, "Model Type: {}", analysis.model_type);
    let _ = writeln!(out, "Complexity: {}", analysis.complexity_assessment);
    let _ = writeln!(out);
    bullet_list(&mut out, "Print Challenges:", &analysis.print_challenges);
    bullet_list(&mut out, "Key Considerations:", &analysis.key_considerations);

    let p = &rec.profile;
    let _ = writeln!(out, "PROFILE SETTINGS");
    let _ = writeln!(out, "{light}");
    let _ = writeln!(out);
    let groups: [(&str, Vec<String>); 7] = [
        (
            "Layer Settings:",
            vec![
                format!("Layer Height: {} mm", p.layer_height),
                format!("First Layer Height: {} mm", p.first_layer_height),
            ],
        ),
        (
            "Walls and Shells:",
            vec![
                format!("Perimeters: {}", p.perimeters),
                format!("Top Solid Layers: {}", p.top_solid_layers),
                format!("Bottom Solid Layers: {}", p.bottom_solid_layers),
            ],
        ),
        (
            "Infill:",
            vec![
                format!("Density: {}%", p.infill_percentage),
                format!("Pattern: {}", p.infill_pattern),
            ],
        ),
        (
            "Support:",
            vec![
                format!("Enable Support: {}", p.support_material),
                format!("Support Type: {}", p.support_type),
                format!("Support Style: {}", p.support_style),
                format!("Angle Threshold: {}°", p.support_angle_threshold),
            ],
        ),
        (
            "Speed (mm/s):",
            vec![
                format!("Print Speed: {}", p.print_speed),
                format!("First Layer Speed: {}", p.first_layer_speed),
                format!("Perimeter Speed: {}", p.perimeter_speed),
                format!("Infill Speed: {}", p.infill_speed),
                format!("Travel Speed: {}", p.travel_speed),
            ],
        ),
        (
            "Temperature:",
            vec![
                format!("Nozzle: {}°C", p.temperature),
                format!("Bed: {}°C", p.bed_temperature),
            ],
        ),
        (
            "Cooling:",
            vec![
                format!("Fan Speed: {}%", p.cooling_fan_speed),
                format!("First Layer Fan: {}%", p.first_layer_fan_speed),
            ],
        ),
    ];
    for (title, lines) in groups {
        let _ = writeln!(out, "{title}");
        for line in lines {
            let _ = writeln!(out, "  {line}");
        }
        let _ = writeln!(out);
    }

    if !rec.reasoning.is_empty() {
        let _ = writeln!(out, "REASONING");
        let _ = writeln!(out, "{light}");
        let _ = writeln!(out, "{}", rec.reasoning);
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "GEOMETRY");
    let _ = writeln!(out, "{light}");
    let _ = writeln!(out, "{}", features.summary());
    let _ = writeln!(out);

    let _ = writeln!(out, "RECOMMENDATIONS");
    let _ = writeln!(out, "{light}");
    let _ = writeln!(out, "Material: {}", rec.material_suggestion);
    let _ = writeln!(out, "Expected Quality: {}", rec.estimated_quality);
    let _ = writeln!(out);
    let _ = writeln!(out, "{heavy}");
    out
}

fn bullet_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{title}");
    for item in items {
        let _ = writeln!(out, "  • {item}");
    }
    let _ = writeln!(out);
}

/// Slicer-neutral profile document kept next to the archive.
pub fn reference_profile_json(
    features: &FeatureSet,
    rec: &Recommendation,
    material: &str,
    generated_at: DateTime<Utc>,
) -> serde_json::Value {
    let p = &rec.profile;
    json!({
        "version": "1.0",
        "generator": format!("mesh-profile {}", env!("CARGO_PKG_VERSION")),
        "generated_at": generated_at.to_rfc3339(),
        "material": material,
        "model_hash": features.fingerprint,
        "source": rec.source,
        "analysis": rec.analysis,
        "settings": {
            "layer_height": p.layer_height,
            "first_layer_height": p.first_layer_height,
            "wall_loops": p.perimeters,
            "top_shell_layers": p.top_solid_layers,
            "bottom_shell_layers": p.bottom_solid_layers,
            "sparse_infill_density": format!("{}%", p.infill_percentage),
            "sparse_infill_pattern": p.infill_pattern,
            "enable_support": p.support_material,
            "support_type": p.support_type,
            "support_threshold_angle": p.support_angle_threshold,
            "brim_width": p.brim_width,
            "brim_type": "outer_only",
            "default_speed": p.print_speed,
            "initial_layer_speed": p.first_layer_speed,
            "outer_wall_speed": p.perimeter_speed,
            "inner_wall_speed": p.perimeter_speed,
            "sparse_infill_speed": p.infill_speed,
            "travel_speed": p.travel_speed,
            "retraction_length": p.retraction_length,
            "retraction_speed": p.retraction_speed,
            "nozzle_temperature": p.temperature,
            "bed_temperature": p.bed_temperature,
            "nozzle_temperature_initial_layer": p.temperature,
            "fan_cooling_layer_time": 10,
            "slow_down_for_layer_cooling": true,
            "fan_max_speed": p.cooling_fan_speed,
            "fan_min_speed": p.first_layer_fan_speed,
            "resolution": 0.01,
            "detect_thin_wall": true,
        },
        "reasoning": rec.reasoning,
        "estimated_quality": rec.estimated_quality,
    })
}
