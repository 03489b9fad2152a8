//! Subcommand implementations.

pub mod analyze;
pub mod generate;
pub mod package;
pub mod place;
pub mod settings;

use std::path::Path;

use anyhow::{Context, Result};
use mesh_profile::{Baseline, FeatureSet, Mesh, ProfileRecord, RuleBasedRecommender};

pub(crate) fn load_mesh(input: &Path) -> Result<Mesh> {
    Mesh::load(input).with_context(|| format!("Failed to load mesh from {:?}", input))
}

pub(crate) fn load_baseline(path: Option<&Path>) -> Result<Baseline> {
    match path {
        Some(path) => Baseline::from_file(path)
            .with_context(|| format!("Failed to load baseline from {:?}", path)),
        None => Ok(Baseline::empty()),
    }
}

/// Read a profile from JSON, or derive one from the features.
pub(crate) fn resolve_profile(
    path: Option<&Path>,
    features: &FeatureSet,
    material: &str,
) -> Result<ProfileRecord> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile {:?}", path))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid profile JSON in {:?}", path))
        }
        None => Ok(RuleBasedRecommender::new(material)
            .recommend_profile(features, &[])
            .profile),
    }
}
