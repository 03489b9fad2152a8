//! mesh-profile generate command - run the full profiling job.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_profile::{
    ConsumerVariant, ProfileConfig, ProfileJob, ProfileRecord, RuleBasedRecommender, run_job,
};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct GenerateResult {
    base_name: String,
    settings: String,
    reference: String,
    report: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    package_error: Option<String>,
}

pub fn run(
    input: &Path,
    output_dir: Option<&Path>,
    config_path: Option<&Path>,
    profile_path: Option<&Path>,
    consumer: Option<ConsumerVariant>,
    cli: &Cli,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => ProfileConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?,
        None => ProfileConfig::default(),
    };
    if let Some(dir) = output_dir {
        config.output.output_dir = dir.to_path_buf();
    }
    if let Some(consumer) = consumer {
        config.output.consumer = consumer;
    }

    let recommender = RuleBasedRecommender::new(config.output.material.clone());
    let mut job = ProfileJob::new(input, config);
    if let Some(path) = profile_path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {:?}", path))?;
        let profile: ProfileRecord = serde_json::from_str(&text)
            .with_context(|| format!("Invalid profile JSON in {:?}", path))?;
        job = job.with_profile(profile);
    }

    output::info(&format!("Profiling {}...", input.display()), cli.format, cli.quiet);
    let outcome = run_job(&job, &recommender, None)?;

    let display = |p: &PathBuf| p.display().to_string();
    let result = GenerateResult {
        base_name: outcome.base_name.clone(),
        settings: display(&outcome.settings_path),
        reference: display(&outcome.reference_path),
        report: display(&outcome.report_path),
        package: outcome.package.as_ref().ok().map(display),
        package_error: outcome.package.as_ref().err().map(|e| e.to_string()),
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Generated Artifacts".bold().underline());
                output::field("Settings", &result.settings);
                output::field("Reference", &result.reference);
                output::field("Report", &result.report);
                match &outcome.package {
                    Ok(path) => output::field("Package", path.display()),
                    Err(e) => output::warning(
                        &format!("Package not written: {} [{}]", e, e.code()),
                        cli.format,
                        cli.quiet,
                    ),
                }
            }
        }
    }
    Ok(())
}
