//! mesh-profile settings command - write the flat settings table.

use std::path::Path;

use anyhow::{Context, Result};
use mesh_profile::{ConsumerVariant, FeatureParams, SettingsTable, extract_features};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

use super::{load_baseline, load_mesh, resolve_profile};

#[derive(Serialize)]
struct SettingsResult {
    input: String,
    output: String,
    consumer: ConsumerVariant,
    keys: usize,
    changed_keys: Vec<String>,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    input: &Path,
    output_path: &Path,
    baseline: Option<&Path>,
    profile: Option<&Path>,
    material: &str,
    consumer: ConsumerVariant,
    cli: &Cli,
) -> Result<()> {
    let mesh = load_mesh(input)?;
    let features = extract_features(&mesh, &FeatureParams::default());
    let baseline = load_baseline(baseline)?;
    let profile = resolve_profile(profile, &features, material)?;

    let table = SettingsTable::for_consumer(&baseline, &profile, material, consumer);
    let json = table.to_json_pretty()?;
    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write settings to {:?}", output_path))?;

    let result = SettingsResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        consumer,
        keys: table.len(),
        changed_keys: table.changed_keys().to_vec(),
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => output::success(
            &format!(
                "Wrote {} settings ({} changed) for {} to {}",
                result.keys,
                result.changed_keys.len(),
                consumer,
                output_path.display()
            ),
            cli.format,
            cli.quiet,
        ),
    }
    Ok(())
}
