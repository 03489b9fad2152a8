//! End-to-end profiling job.
//!
//! [`run_job`] loads the mesh, extracts features, asks the recommender, and
//! writes three independent artifacts into the output directory:
//!
//! - `<base>_config.json`: the flat settings table for the consumer
//! - `<base>.json`: the reference profile document
//! - `<base>_summary.txt`: the plain-text report
//!
//! and then the package `<base>.3mf`. Load, extraction, and settings errors
//! end the job. A packaging error does not: it is returned in
//! [`JobOutcome::package`] and the other artifacts stay on disk. When a case
//! store is given, the finished case is recorded in it; a store failure is
//! logged and leaves [`JobOutcome::case_id`] empty.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::assemble::{PackageOptions, export_package};
use crate::config::ProfileConfig;
use crate::error::{ProfileError, ProfileResult};
use crate::features::{FeatureSet, extract_features};
use crate::recommend::{
    CaseStore, Recommendation, Recommender, recommend_with, record_case_or_skip,
};
use crate::report::{reference_profile_json, render_report};
use crate::settings::{Baseline, ProfileRecord, SettingsTable};
use crate::tracing_ext::{OperationTimer, log_artifact};
use crate::types::Mesh;

/// Prior cases requested from the store.
pub const SIMILAR_CASE_LIMIT: usize = 3;

const MAX_BASE_NAME_CHARS: usize = 50;
const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// One profiling request.
#[derive(Debug, Clone)]
pub struct ProfileJob {
    pub input: PathBuf,
    /// Name used for artifact files; defaults to the input file stem.
    pub name: Option<String>,
    pub config: ProfileConfig,
    /// Use this profile instead of the recommender's.
    pub profile: Option<ProfileRecord>,
    /// Timestamp for file names and documents; defaults to now.
    pub generated_at: Option<DateTime<Utc>>,
}

impl ProfileJob {
    pub fn new(input: impl Into<PathBuf>, config: ProfileConfig) -> Self {
        Self {
            input: input.into(),
            name: None,
            config,
            profile: None,
            generated_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_profile(mut self, profile: ProfileRecord) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }
}

/// What a job produced.
#[derive(Debug)]
pub struct JobOutcome {
    pub base_name: String,
    pub features: FeatureSet,
    pub recommendation: Recommendation,
    pub settings: SettingsTable,
    pub settings_path: PathBuf,
    pub reference_path: PathBuf,
    pub report_path: PathBuf,
    /// Path of the written package, or why packaging failed.
    pub package: Result<PathBuf, ProfileError>,
    /// Id of the case recorded in the store, if any.
    pub case_id: Option<String>,
}

impl JobOutcome {
    /// Every artifact that exists on disk.
    pub fn artifacts(&self) -> Vec<&Path> {
        let mut paths = vec![
            self.settings_path.as_path(),
            self.reference_path.as_path(),
            self.report_path.as_path(),
        ];
        if let Ok(p) = &self.package {
            paths.push(p.as_path());
        }
        paths
    }
}

/// Sanitized file stem plus a `_YYYYMMDD_HHMMSS` timestamp.
///
/// The directory and extension are dropped, each of `<>:"/\|?*` becomes
/// `_`, and the stem is cut to 50 characters.
pub fn base_name(name: &str, at: DateTime<Utc>) -> String {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    let safe: String = stem
        .chars()
        .map(|c| if INVALID_NAME_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_BASE_NAME_CHARS)
        .collect();
    let safe = if safe.is_empty() { "model".to_string() } else { safe };
    format!("{}_{}", safe, at.format("%Y%m%d_%H%M%S"))
}

/// Run one job.
pub fn run_job(
    job: &ProfileJob,
    recommender: &dyn Recommender,
    store: Option<&dyn CaseStore>,
) -> ProfileResult<JobOutcome> {
    let _timer = OperationTimer::new("run_job");
    let config = &job.config;
    let output = &config.output;
    let at = job.generated_at.unwrap_or_else(Utc::now);

    let display_name = job
        .name
        .clone()
        .unwrap_or_else(|| job.input.to_string_lossy().into_owned());
    let base = base_name(&display_name, at);
    info!(input = %job.input.display(), base = %base, consumer = %output.consumer, "Profiling job started");

    let mesh = Mesh::load(&job.input)?;
    let features = extract_features(&mesh, &config.features);

    let mut recommendation = recommend_with(recommender, store, &features, SIMILAR_CASE_LIMIT);
    if let Some(profile) = &job.profile {
        recommendation.profile = profile.clone();
    }

    let baseline = match &output.baseline_path {
        Some(path) => Baseline::from_file(path)?,
        None => Baseline::empty(),
    };
    let settings = SettingsTable::for_consumer(
        &baseline,
        &recommendation.profile,
        &output.material,
        output.consumer,
    );

    std::fs::create_dir_all(&output.output_dir)
        .map_err(|e| ProfileError::io_write(&output.output_dir, e))?;
    let dir = output.output_dir.as_path();

    let settings_path = dir.join(format!("{}_config.json", base));
    write_artifact("settings", &settings_path, settings.to_json_pretty()?.as_bytes())?;

    let reference_path = dir.join(format!("{}.json", base));
    let reference = reference_profile_json(&features, &recommendation, &output.material, at);
    let reference_text = serde_json::to_string_pretty(&reference)
        .map_err(|e| ProfileError::part_encoding("reference profile", e))?;
    write_artifact("reference", &reference_path, reference_text.as_bytes())?;

    let report_path = dir.join(format!("{}_summary.txt", base));
    write_artifact(
        "report",
        &report_path,
        render_report(&features, &recommendation, at).as_bytes(),
    )?;

    let case_id = record_case_or_skip(store, &features, &recommendation, at);

    let package_path = dir.join(format!("{}.3mf", base));
    let package = write_job_package(&mesh, &recommendation, &settings, job, at, &package_path)
        .map(|()| package_path);
    if let Err(e) = &package {
        warn!(error = %e, code = e.code().as_str(), "Packaging failed; other artifacts were kept");
    }

    info!(base = %base, packaged = package.is_ok(), "Profiling job finished");
    Ok(JobOutcome {
        base_name: base,
        features,
        recommendation,
        settings,
        settings_path,
        reference_path,
        report_path,
        package,
        case_id,
    })
}

fn write_job_package(
    mesh: &Mesh,
    recommendation: &Recommendation,
    settings: &SettingsTable,
    job: &ProfileJob,
    at: DateTime<Utc>,
    path: &Path,
) -> ProfileResult<()> {
    let placement = &job.config.placement;
    let transform = mesh.solve_placement(&placement.plate(), placement.margin)?;
    let title = job
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    let options = PackageOptions {
        title,
        layer_height: recommendation.profile.layer_height,
        created: at,
        ..PackageOptions::default()
    };
    export_package(
        mesh,
        &transform,
        settings,
        job.config.output.consumer,
        &options,
        path,
    )
}

fn write_artifact(kind: &str, path: &Path, bytes: &[u8]) -> ProfileResult<()> {
    std::fs::write(path, bytes).map_err(|e| ProfileError::io_write(path, e))?;
    log_artifact(kind, path, bytes.len() as u64);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_base_name_plain() {
        assert_eq!(base_name("models/bracket.stl", at()), "bracket_20240102_030405");
    }

    #[test]
    fn test_base_name_replaces_invalid_chars() {
        assert_eq!(base_name("a<b>c:d|e?f*g\"h.obj", at()), "a_b_c_d_e_f_g_h_20240102_030405");
    }

    #[test]
    fn test_base_name_truncates() {
        let long = "x".repeat(80);
        let name = base_name(&long, at());
        assert_eq!(name, format!("{}_20240102_030405", "x".repeat(50)));
    }

    #[test]
    fn test_base_name_windows_path_and_empty() {
        assert_eq!(base_name("C:\\scans\\part.ply", at()), "part_20240102_030405");
        assert_eq!(base_name("", at()), "model_20240102_030405");
        assert_eq!(base_name(".hidden", at()), ".hidden_20240102_030405");
    }
}
