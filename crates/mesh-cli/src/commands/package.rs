//! mesh-profile package command - write a 3MF package.

use std::path::Path;

use anyhow::{Context, Result};
use mesh_profile::{
    BuildPlate, ConsumerVariant, FeatureParams, PackageOptions, SettingsTable, export_package,
    extract_features,
};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

use super::{load_baseline, load_mesh, resolve_profile};

#[derive(Serialize)]
struct PackageResult {
    input: String,
    output: String,
    consumer: ConsumerVariant,
    scale: f64,
    bytes: u64,
}

/// Options of the package command besides input and output.
pub struct PackageArgs<'a> {
    pub consumer: ConsumerVariant,
    pub baseline: Option<&'a Path>,
    pub profile: Option<&'a Path>,
    pub material: &'a str,
    pub plate: f64,
    pub margin: f64,
}

pub fn run(input: &Path, output_path: &Path, args: PackageArgs<'_>, cli: &Cli) -> Result<()> {
    let mesh = load_mesh(input)?;
    let features = extract_features(&mesh, &FeatureParams::default());
    let baseline = load_baseline(args.baseline)?;
    let profile = resolve_profile(args.profile, &features, args.material)?;
    let settings = SettingsTable::for_consumer(&baseline, &profile, args.material, args.consumer);

    let transform = mesh
        .solve_placement(&BuildPlate::square(args.plate), args.margin)
        .with_context(|| "Placement failed")?;

    output::info(
        &format!("Packaging {} faces for {}...", mesh.face_count(), args.consumer),
        cli.format,
        cli.quiet,
    );

    let options = PackageOptions {
        title: input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string()),
        layer_height: profile.layer_height,
        ..PackageOptions::default()
    };
    export_package(&mesh, &transform, &settings, args.consumer, &options, output_path)
        .with_context(|| format!("Failed to write package {:?}", output_path))?;

    let bytes = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);
    let result = PackageResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        consumer: args.consumer,
        scale: transform.scale,
        bytes,
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => output::success(
            &format!("Package saved to {} ({} bytes)", output_path.display(), bytes),
            cli.format,
            cli.quiet,
        ),
    }
    Ok(())
}
