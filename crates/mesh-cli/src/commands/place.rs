//! mesh-profile place command - solve the build-plate transform.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_profile::BuildPlate;
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

use super::load_mesh;

#[derive(Serialize)]
struct PlacementResult {
    input: String,
    plate: [f64; 2],
    margin: f64,
    scale: f64,
    translation: [f64; 3],
    matrix_3mf: String,
    placed_min: [f64; 3],
    placed_max: [f64; 3],
}

pub fn run(
    input: &Path,
    plate: f64,
    plate_depth: Option<f64>,
    margin: f64,
    cli: &Cli,
) -> Result<()> {
    let mesh = load_mesh(input)?;
    let plate = BuildPlate::new(plate, plate_depth.unwrap_or(plate));
    let transform = mesh
        .solve_placement(&plate, margin)
        .with_context(|| "Placement failed")?;

    let local = mesh.centered();
    let placed = local
        .bounds()
        .map(|b| transform.apply_bounds(&b))
        .context("Mesh has no bounds")?;

    let result = PlacementResult {
        input: input.display().to_string(),
        plate: [plate.width, plate.depth],
        margin,
        scale: transform.scale,
        translation: [
            transform.translation.x,
            transform.translation.y,
            transform.translation.z,
        ],
        matrix_3mf: transform.to_3mf_matrix(),
        placed_min: [placed.min.x, placed.min.y, placed.min.z],
        placed_max: [placed.max.x, placed.max.y, placed.max.z],
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => {
            if cli.quiet {
                return Ok(());
            }
            println!("{}", "Placement".bold().underline());
            output::field("Plate", format!("{} x {} mm (margin {} mm)", plate.width, plate.depth, margin));
            output::field("Scale", format!("{:.4}", result.scale));
            output::field(
                "Translation",
                format!("({:.2}, {:.2}, {:.2})", result.translation[0], result.translation[1], result.translation[2]),
            );
            output::field("3MF transform", &result.matrix_3mf);
            output::field(
                "Footprint",
                format!(
                    "X {:.2}..{:.2}, Y {:.2}..{:.2}",
                    placed.min.x, placed.max.x, placed.min.y, placed.max.y
                ),
            );
            if result.scale < 1.0 {
                output::warning("Model was scaled down to fit the plate", cli.format, cli.quiet);
            }
        }
    }
    Ok(())
}
