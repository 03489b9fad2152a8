//! Output helpers shared by the commands.
//!
//! Results go to stdout; progress and status lines go to stderr so JSON
//! output stays machine-readable.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable result as pretty JSON (in either format).
pub fn print<T: Serialize>(value: &T, _format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("{}: failed to serialize output: {}", "Error".red().bold(), e),
    }
}

/// Print a progress line in text mode.
pub fn info(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    eprintln!("{} {}", "→".blue(), message);
}

/// Print a success line in text mode.
pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Print a warning line in text mode.
pub fn warning(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    eprintln!("{} {}", "!".yellow().bold(), message);
}

/// Print a `label: value` line.
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {}: {}", label.cyan(), value);
}
