//! mesh-profile analyze command - extract and print geometric features.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use mesh_profile::{FeatureParams, OverhangParams, extract_features};

use crate::{Cli, OutputFormat, output};

use super::load_mesh;

pub fn run(input: &Path, overhang_threshold: Option<f64>, cli: &Cli) -> Result<()> {
    let mesh = load_mesh(input)?;

    let mut params = FeatureParams::default();
    if let Some(threshold) = overhang_threshold {
        params.overhang = OverhangParams {
            threshold_deg: threshold,
            ..params.overhang
        };
    }
    let features = extract_features(&mesh, &params);

    match cli.format {
        OutputFormat::Json => output::print(&features, cli.format, cli.quiet),
        OutputFormat::Text => {
            if cli.quiet {
                return Ok(());
            }
            println!("{}", "Mesh Features".bold().underline());
            output::field("File", input.display());
            output::field("Vertices", features.vertex_count);
            output::field("Faces", features.face_count);
            output::field("Fingerprint", &features.fingerprint[..16]);
            println!();
            for line in features.summary().lines() {
                println!("  {}", line);
            }
            println!();
            output::field("Surface", features.surface.surface_type);
            output::field(
                "Orientation",
                format!(
                    "{} up ({})",
                    features.orientation.suggested_up_axis, features.orientation.optimal_rotation
                ),
            );
            for warning in &features.warnings {
                output::warning(&warning.to_string(), cli.format, cli.quiet);
            }
        }
    }
    Ok(())
}
