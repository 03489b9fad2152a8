//! Consumer variants and the package layout each one expects.
//!
//! The differences between slicers are data in [`ConsumerPolicy`]; the
//! assembler and the settings mapper read the policy instead of branching on
//! the variant.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A slicer family that will open the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerVariant {
    /// Plain 3MF core: model part only.
    Core,
    /// PrusaSlicer-lineage Orca: model part plus flat settings JSON.
    Orca,
    /// Bambu-lineage Orca (Elegoo): split model/object parts, project
    /// settings, positioning, plate and thumbnail metadata.
    #[default]
    ElegooOrca,
}

impl ConsumerVariant {
    pub const ALL: [ConsumerVariant; 3] = [
        ConsumerVariant::Core,
        ConsumerVariant::Orca,
        ConsumerVariant::ElegooOrca,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerVariant::Core => "core",
            ConsumerVariant::Orca => "orca",
            ConsumerVariant::ElegooOrca => "elegoo_orca",
        }
    }

    pub fn policy(&self) -> &'static ConsumerPolicy {
        match self {
            ConsumerVariant::Core => &CORE_POLICY,
            ConsumerVariant::Orca => &ORCA_POLICY,
            ConsumerVariant::ElegooOrca => &ELEGOO_POLICY,
        }
    }
}

impl std::fmt::Display for ConsumerVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsumerVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "core" | "3mf" => Ok(ConsumerVariant::Core),
            "orca" => Ok(ConsumerVariant::Orca),
            "elegoo_orca" | "elegoo" => Ok(ConsumerVariant::ElegooOrca),
            other => Err(format!(
                "unknown consumer '{}' (expected core, orca, or elegoo_orca)",
                other
            )),
        }
    }
}

/// How settings values are written for a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsDialect {
    /// Bambu-style keys; multi-slot keys are single-element lists.
    Bambu,
    /// PrusaSlicer-style keys, all scalars.
    Slic3r,
}

/// Package layout and settings conventions of one consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerPolicy {
    /// Mesh lives in `3D/Objects/object_1.model`; the root model references
    /// it as a component.
    pub split_object_part: bool,
    /// Add Bambu project metadata and production UUIDs to the root model.
    pub bambu_model_metadata: bool,
    /// Parts holding the flat settings JSON.
    pub settings_parts: &'static [&'static str],
    /// XML part with object/part/plate ids and the transform.
    pub positioning_part: Option<&'static str>,
    pub plate_part: Option<&'static str>,
    pub slice_info_part: Option<&'static str>,
    /// Placeholder thumbnails; the first is linked from the root rels.
    pub thumbnails: &'static [&'static str],
    pub dialect: SettingsDialect,
    /// Settings key that lists the keys changed from the baseline.
    pub changed_keys_field: Option<&'static str>,
}

impl ConsumerPolicy {
    /// Every part path this policy adds besides the model parts.
    pub fn metadata_parts(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.settings_parts
            .iter()
            .copied()
            .chain(self.positioning_part)
            .chain(self.plate_part)
            .chain(self.slice_info_part)
            .chain(self.thumbnails.iter().copied())
    }
}

pub const ROOT_MODEL_PART: &str = "3D/3dmodel.model";
pub const OBJECT_MODEL_PART: &str = "3D/Objects/object_1.model";

static CORE_POLICY: ConsumerPolicy = ConsumerPolicy {
    split_object_part: false,
    bambu_model_metadata: false,
    settings_parts: &[],
    positioning_part: None,
    plate_part: None,
    slice_info_part: None,
    thumbnails: &[],
    dialect: SettingsDialect::Slic3r,
    changed_keys_field: None,
};

static ORCA_POLICY: ConsumerPolicy = ConsumerPolicy {
    split_object_part: false,
    bambu_model_metadata: false,
    settings_parts: &[
        "Metadata/Slic3r_PE.json",
        "Metadata/Slic3r_PE_model.json",
        "Metadata/model_settings.json",
    ],
    positioning_part: None,
    plate_part: None,
    slice_info_part: None,
    thumbnails: &[],
    dialect: SettingsDialect::Slic3r,
    changed_keys_field: None,
};

static ELEGOO_POLICY: ConsumerPolicy = ConsumerPolicy {
    split_object_part: true,
    bambu_model_metadata: true,
    settings_parts: &["Metadata/project_settings.config"],
    positioning_part: Some("Metadata/model_settings.config"),
    plate_part: Some("Metadata/plate_1.json"),
    slice_info_part: Some("Metadata/slice_info.config"),
    thumbnails: &[
        "Metadata/plate_1.png",
        "Metadata/plate_1_small.png",
        "Metadata/plate_no_light_1.png",
        "Metadata/top_1.png",
        "Metadata/pick_1.png",
    ],
    dialect: SettingsDialect::Bambu,
    changed_keys_field: Some("different_settings_to_system"),
};
