//! mesh-profile: turn a mesh into print settings and a slicer package.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_profile=info` - Stage summaries
//! - `RUST_LOG=mesh_profile=debug` - Counts, bounds, and intermediate values
//! - `RUST_LOG=mesh_profile::timing=debug` - Stage timings
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # Print the geometric features of a model
//! mesh-profile analyze bracket.stl
//!
//! # Full job with info logging
//! RUST_LOG=mesh_profile=info mesh-profile generate bracket.stl --output-dir out/
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use mesh_profile::ConsumerVariant;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{analyze, generate, package, place, settings};

/// mesh-profile - Geometric analysis and slicer packaging for 3D meshes.
///
/// Extract printability features, solve build-plate placement, and write
/// settings and 3MF packages that slicers open directly.
#[derive(Parser)]
#[command(name = "mesh-profile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and display geometric features
    Analyze {
        /// Input mesh file
        input: PathBuf,

        /// Overhang threshold in degrees past vertical
        #[arg(long)]
        overhang_threshold: Option<f64>,
    },

    /// Solve the build-plate transform
    Place {
        /// Input mesh file
        input: PathBuf,

        /// Plate width in mm (also the depth unless --plate-depth is given)
        #[arg(long, default_value = "220")]
        plate: f64,

        /// Plate depth in mm
        #[arg(long)]
        plate_depth: Option<f64>,

        /// Clearance from each plate edge in mm
        #[arg(long, default_value = "5")]
        margin: f64,
    },

    /// Write the flat settings table for a slicer
    Settings {
        /// Input mesh file
        input: PathBuf,

        /// Output JSON path
        #[arg(short, long)]
        output: PathBuf,

        /// Flat JSON baseline the profile is laid over
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Profile JSON to use instead of the built-in recommender
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Filament material
        #[arg(long, default_value = "PLA")]
        material: String,

        /// Target slicer (core, orca, elegoo_orca)
        #[arg(long, default_value = "elegoo_orca")]
        consumer: ConsumerVariant,
    },

    /// Write a 3MF package with embedded settings
    Package {
        /// Input mesh file
        input: PathBuf,

        /// Output .3mf path
        #[arg(short, long)]
        output: PathBuf,

        /// Target slicer (core, orca, elegoo_orca)
        #[arg(long, default_value = "elegoo_orca")]
        consumer: ConsumerVariant,

        /// Flat JSON baseline the profile is laid over
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Profile JSON to use instead of the built-in recommender
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Filament material
        #[arg(long, default_value = "PLA")]
        material: String,

        /// Square plate size in mm
        #[arg(long, default_value = "220")]
        plate: f64,

        /// Clearance from each plate edge in mm
        #[arg(long, default_value = "5")]
        margin: f64,
    },

    /// Run the full job: settings, reference profile, report, and package
    Generate {
        /// Input mesh file
        input: PathBuf,

        /// Directory for the artifacts
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// TOML or JSON job configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Profile JSON to use instead of the built-in recommender
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Target slicer, overriding the configuration
        #[arg(long)]
        consumer: Option<ConsumerVariant>,
    },
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "mesh_profile=info",
            2 => "mesh_profile=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Analyze {
            input,
            overhang_threshold,
        } => analyze::run(input, *overhang_threshold, &cli),
        Commands::Place {
            input,
            plate,
            plate_depth,
            margin,
        } => place::run(input, *plate, *plate_depth, *margin, &cli),
        Commands::Settings {
            input,
            output,
            baseline,
            profile,
            material,
            consumer,
        } => settings::run(
            input,
            output,
            baseline.as_deref(),
            profile.as_deref(),
            material,
            *consumer,
            &cli,
        ),
        Commands::Package {
            input,
            output,
            consumer,
            baseline,
            profile,
            material,
            plate,
            margin,
        } => package::run(
            input,
            output,
            package::PackageArgs {
                consumer: *consumer,
                baseline: baseline.as_deref(),
                profile: profile.as_deref(),
                material: material.as_str(),
                plate: *plate,
                margin: *margin,
            },
            &cli,
        ),
        Commands::Generate {
            input,
            output_dir,
            config,
            profile,
            consumer,
        } => generate::run(
            input,
            output_dir.as_deref(),
            config.as_deref(),
            profile.as_deref(),
            *consumer,
            &cli,
        ),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            for (label, text) in error_lines(e) {
                match label {
                    "Error" => eprintln!("{}: {}", label.red().bold(), text),
                    "Code" | "Stage" => eprintln!("  {}: {}", label.cyan(), text),
                    "Suggestion" => eprintln!("  {}: {}", label.green(), text),
                    _ => eprintln!("  {}: {}", label.yellow(), text),
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Labelled lines for a failed command: the outermost message, then every
/// cause. The first library error in the chain adds its code, stage,
/// suggestion and location.
fn error_lines(e: &anyhow::Error) -> Vec<(&'static str, String)> {
    let mut lines = vec![("Error", e.to_string())];
    let mut detailed = false;
    for (depth, cause) in e.chain().enumerate() {
        if depth > 0 {
            lines.push(("Caused by", cause.to_string()));
        }
        if detailed {
            continue;
        }
        if let Some(err) = cause.downcast_ref::<mesh_profile::ProfileError>() {
            detailed = true;
            lines.push(("Code", err.code().to_string()));
            lines.push(("Stage", err.stage().to_string()));
            lines.push(("Suggestion", err.recovery_suggestion().to_string()));
            if let Some(location) = err.location() {
                lines.push(("Location", location.to_string()));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_consumer_argument() {
        let cli = Cli::try_parse_from(["mesh-profile", "package", "a.stl", "-o", "a.3mf", "--consumer", "orca"])
            .unwrap();
        match cli.command {
            Commands::Package { consumer, plate, .. } => {
                assert_eq!(consumer, ConsumerVariant::Orca);
                assert_eq!(plate, 220.0);
            }
            _ => panic!("expected package"),
        }
        assert!(Cli::try_parse_from(["mesh-profile", "package", "a.stl", "-o", "a.3mf", "--consumer", "cura"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["mesh-profile", "analyze", "a.stl", "--format", "json", "-vv"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_error_lines_keep_context() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = anyhow::Error::new(mesh_profile::ProfileError::io_read("part.stl", source))
            .context("failed to analyze part.stl");
        let lines = error_lines(&err);

        assert_eq!(lines[0], ("Error", "failed to analyze part.stl".to_string()));
        let labels: Vec<&str> = lines.iter().map(|(label, _)| *label).collect();
        assert!(labels.contains(&"Code"));
        assert!(labels.contains(&"Suggestion"));
        assert!(lines.iter().any(|(label, text)| *label == "Caused by" && text.contains("part.stl")));
        assert_eq!(labels.iter().filter(|l| **l == "Code").count(), 1);
    }

    #[test]
    fn test_error_lines_plain_error() {
        let err = anyhow::anyhow!("bad input").context("while loading");
        let lines = error_lines(&err);
        assert_eq!(
            lines,
            vec![("Error", "while loading".to_string()), ("Caused by", "bad input".to_string())]
        );
    }
}
