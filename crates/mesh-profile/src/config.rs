//! Serializable job configuration.
//!
//! A [`ProfileConfig`] gathers every tunable of a profiling job so it can be
//! kept in a TOML or JSON file. All sections and fields have defaults, so a
//! partial file is enough.
//!
//! # Example TOML
//!
//! ```toml
//! [features.overhang]
//! threshold_deg = 50.0
//!
//! [placement]
//! plate_width = 256.0
//! plate_depth = 256.0
//!
//! [output]
//! consumer = "orca"
//! material = "PETG"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consumer::ConsumerVariant;
use crate::error::{ProfileError, ProfileResult};
use crate::features::FeatureParams;
use crate::transform::BuildPlate;

/// Build plate and margin used by the transform solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementParams {
    pub plate_width: f64,
    pub plate_depth: f64,
    /// Clearance kept from every plate edge, in mm.
    pub margin: f64,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            plate_width: 220.0,
            plate_depth: 220.0,
            margin: 5.0,
        }
    }
}

impl PlacementParams {
    pub fn plate(&self) -> BuildPlate {
        BuildPlate::new(self.plate_width, self.plate_depth)
    }
}

/// Where and for whom artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputParams {
    pub consumer: ConsumerVariant,
    pub material: String,
    /// Flat JSON baseline the settings overrides are laid over.
    pub baseline_path: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            consumer: ConsumerVariant::default(),
            material: "PLA".to_string(),
            baseline_path: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Complete configuration of a profiling job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub features: FeatureParams,
    pub placement: PlacementParams,
    pub output: OutputParams,
}

impl ProfileConfig {
    pub fn from_toml(toml_str: &str) -> ProfileResult<Self> {
        toml::from_str(toml_str).map_err(|e| ProfileError::ConfigParse {
            path: None,
            details: e.to_string(),
        })
    }

    /// Load from a TOML file, or JSON when the extension is `.json`.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ProfileResult<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ProfileError::io_read(path, e))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            toml::from_str(&contents).map_err(|e| e.to_string())
        };
        let config = parsed.map_err(|details| ProfileError::ConfigParse {
            path: Some(path.to_path_buf()),
            details,
        })?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn to_toml(&self) -> ProfileResult<String> {
        toml::to_string_pretty(self).map_err(|e| ProfileError::ConfigSerialize {
            details: e.to_string(),
        })
    }

    pub fn save_toml(&self, path: impl AsRef<Path>) -> ProfileResult<()> {
        let path = path.as_ref();
        let toml_str = self.to_toml()?;
        std::fs::write(path, toml_str).map_err(|e| ProfileError::io_write(path, e))
    }

    pub fn from_json(json_str: &str) -> ProfileResult<Self> {
        serde_json::from_str(json_str).map_err(|e| ProfileError::ConfigParse {
            path: None,
            details: e.to_string(),
        })
    }

    pub fn to_json(&self) -> ProfileResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ProfileError::ConfigSerialize {
            details: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ProfileConfig::default();
        assert_eq!(config.placement.plate(), BuildPlate::square(220.0));
        assert_eq!(config.placement.margin, 5.0);
        assert_eq!(config.output.consumer, ConsumerVariant::ElegooOrca);
        assert_eq!(config.output.material, "PLA");
        assert_eq!(config.features.overhang.threshold_deg, 45.0);
    }

    #[test]
    fn test_partial_toml() {
        let config = ProfileConfig::from_toml(
            r#"
            [features.overhang]
            threshold_deg = 50.0

            [placement]
            plate_depth = 250.0

            [output]
            consumer = "orca"
            "#,
        )
        .unwrap();
        assert_eq!(config.features.overhang.threshold_deg, 50.0);
        assert_eq!(config.features.overhang.severe_deg, 60.0);
        assert_eq!(config.placement.plate_width, 220.0);
        assert_eq!(config.placement.plate_depth, 250.0);
        assert_eq!(config.output.consumer, ConsumerVariant::Orca);
        assert_eq!(config.output.material, "PLA");
    }

    #[test]
    fn test_toml_json_agree() {
        let mut config = ProfileConfig::default();
        config.output.material = "PETG".into();
        config.output.baseline_path = Some(PathBuf::from("baseline.json"));
        config.placement.margin = 8.0;

        let from_toml = ProfileConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        let from_json = ProfileConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(from_toml, config);
        assert_eq!(from_json, config);
    }

    #[test]
    fn test_file_loading() {
        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, "[output]\nmaterial = \"ABS\"").unwrap();
        let config = ProfileConfig::from_toml_file(toml_file.path()).unwrap();
        assert_eq!(config.output.material, "ABS");

        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json_file, "{{\"placement\": {{\"margin\": 2.5}}}}").unwrap();
        let config = ProfileConfig::from_toml_file(json_file.path()).unwrap();
        assert_eq!(config.placement.margin, 2.5);
    }

    #[test]
    fn test_parse_error_carries_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[placement\nmargin = ").unwrap();
        let err = ProfileConfig::from_toml_file(file.path()).unwrap_err();
        match err {
            ProfileError::ConfigParse { path, .. } => assert_eq!(path.as_deref(), Some(file.path())),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_consumer_rejected() {
        let err = ProfileConfig::from_toml("[output]\nconsumer = \"cura\"").unwrap_err();
        assert!(matches!(err, ProfileError::ConfigParse { path: None, .. }));
    }
}
