//! Slicer settings: typed profile record, injected baseline, and the flat
//! key/value table written into packages.
//!
//! A [`ProfileRecord`] holds the recommended parameters with typed fields.
//! [`ProfileRecord::overrides`] maps it onto a consumer's key names and value
//! shapes, and [`SettingsTable::merge`] lays those overrides over a
//! [`Baseline`] loaded from a defaults file. The baseline is always passed in;
//! there is no global defaults table.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consumer::{ConsumerVariant, SettingsDialect};
use crate::error::{ProfileError, ProfileResult};

/// One setting value. Serialized untagged: a string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Scalar(String),
    List(Vec<String>),
}

impl SettingValue {
    pub fn scalar(v: impl ToString) -> Self {
        SettingValue::Scalar(v.to_string())
    }

    /// A single-slot list value.
    pub fn slot(v: impl ToString) -> Self {
        SettingValue::List(vec![v.to_string()])
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            SettingValue::Scalar(s) => Some(s),
            SettingValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::List(l) => Some(l),
            SettingValue::Scalar(_) => None,
        }
    }

    /// Convert a JSON value. Numbers and booleans become their text form;
    /// nested objects are rejected.
    fn from_json(key: &str, value: serde_json::Value) -> Result<Self, String> {
        use serde_json::Value;
        match value {
            Value::String(s) => Ok(SettingValue::Scalar(s)),
            Value::Number(n) => Ok(SettingValue::Scalar(n.to_string())),
            Value::Bool(b) => Ok(SettingValue::Scalar(if b { "1" } else { "0" }.to_string())),
            Value::Null => Ok(SettingValue::Scalar(String::new())),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    Value::Number(n) => Ok(n.to_string()),
                    Value::Bool(b) => Ok(if b { "1" } else { "0" }.to_string()),
                    other => Err(format!("key '{}': unsupported list element {}", key, other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(SettingValue::List),
            Value::Object(_) => Err(format!("key '{}': nested objects are not supported", key)),
        }
    }
}

/// Baseline defaults for a consumer, loaded from a JSON object file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Baseline {
    values: BTreeMap<String, SettingValue>,
}

impl Baseline {
    /// An empty baseline; every override then counts as changed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> ProfileResult<Self> {
        Self::parse(json, None)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ProfileResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ProfileError::io_read(path, e))?;
        let baseline = Self::parse(&text, Some(path))?;
        info!(path = %path.display(), keys = baseline.len(), "Loaded settings baseline");
        Ok(baseline)
    }

    fn parse(json: &str, path: Option<&Path>) -> ProfileResult<Self> {
        let err = |details: String| ProfileError::BaselineParse {
            path: path.map(Path::to_path_buf),
            details,
        };
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| err(e.to_string()))?;
        let serde_json::Value::Object(map) = value else {
            return Err(err("baseline must be a JSON object".to_string()));
        };

        let mut values = BTreeMap::new();
        for (key, value) in map {
            let setting = SettingValue::from_json(&key, value).map_err(err)?;
            values.insert(key, setting);
        }
        Ok(Self { values })
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: SettingValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered override list produced by [`ProfileRecord::overrides`].
pub type Overrides = Vec<(String, SettingValue)>;

/// Flat settings table: baseline plus overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsTable {
    values: BTreeMap<String, SettingValue>,
    changed_keys: Vec<String>,
}

impl SettingsTable {
    /// Lay `overrides` over `baseline`. Keys not overridden keep their
    /// baseline value. `changed_keys` lists override keys whose value differs
    /// from the baseline (or that the baseline lacks), in override order.
    pub fn merge(baseline: &Baseline, overrides: Overrides) -> Self {
        let mut values = baseline.values.clone();
        let mut changed_keys: Vec<String> = Vec::new();

        for (key, value) in overrides {
            if baseline.get(&key) != Some(&value) && !changed_keys.contains(&key) {
                changed_keys.push(key.clone());
            }
            values.insert(key, value);
        }

        debug!(
            baseline = baseline.len(),
            total = values.len(),
            changed = changed_keys.len(),
            "Merged settings"
        );
        Self {
            values,
            changed_keys,
        }
    }

    /// Build the table for a consumer: map the profile, merge, and record the
    /// changed-key list when the consumer wants one.
    pub fn for_consumer(
        baseline: &Baseline,
        profile: &ProfileRecord,
        material: &str,
        variant: ConsumerVariant,
    ) -> Self {
        let mut table = Self::merge(baseline, profile.overrides(material, variant));
        if let Some(field) = variant.policy().changed_keys_field {
            let joined = table.changed_keys.join(";");
            table
                .values
                .insert(field.to_string(), SettingValue::List(vec![joined]));
        }
        table
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn changed_keys(&self) -> &[String] {
        &self.changed_keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The flat settings document, keys sorted.
    pub fn to_json_pretty(&self) -> ProfileResult<String> {
        serde_json::to_string_pretty(&self.values)
            .map_err(|e| ProfileError::part_encoding("settings", e))
    }
}

/// Recommended print parameters.
///
/// Every field has a default, so a partial JSON object deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRecord {
    pub layer_height: f64,
    pub first_layer_height: f64,
    pub perimeters: u32,
    pub top_solid_layers: u32,
    pub bottom_solid_layers: u32,
    pub infill_percentage: f64,
    pub infill_pattern: String,
    pub support_material: bool,
    pub support_type: String,
    pub support_style: String,
    pub tree_support_branch_angle: f64,
    pub tree_support_branch_distance: f64,
    pub tree_support_wall_count: u32,
    pub support_angle_threshold: f64,
    pub brim_width: f64,
    pub brim_type: String,
    pub print_speed: f64,
    pub first_layer_speed: f64,
    pub perimeter_speed: f64,
    pub infill_speed: f64,
    pub travel_speed: f64,
    pub retraction_length: f64,
    pub retraction_speed: f64,
    pub temperature: f64,
    pub bed_temperature: f64,
    pub cooling_fan_speed: f64,
    pub first_layer_fan_speed: f64,
}

impl Default for ProfileRecord {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            first_layer_height: 0.2,
            perimeters: 3,
            top_solid_layers: 5,
            bottom_solid_layers: 5,
            infill_percentage: 20.0,
            infill_pattern: "cubic".to_string(),
            support_material: false,
            support_type: "normal".to_string(),
            support_style: "default".to_string(),
            tree_support_branch_angle: 45.0,
            tree_support_branch_distance: 2.5,
            tree_support_wall_count: 0,
            support_angle_threshold: 45.0,
            brim_width: 0.0,
            brim_type: "no_brim".to_string(),
            print_speed: 60.0,
            first_layer_speed: 20.0,
            perimeter_speed: 45.0,
            infill_speed: 80.0,
            travel_speed: 150.0,
            retraction_length: 0.8,
            retraction_speed: 35.0,
            temperature: 210.0,
            bed_temperature: 60.0,
            cooling_fan_speed: 100.0,
            first_layer_fan_speed: 0.0,
        }
    }
}

impl ProfileRecord {
    /// Tree support when the style is "tree" or the type mentions tree.
    pub fn is_tree_support(&self) -> bool {
        self.support_style == "tree" || self.support_type.to_ascii_lowercase().contains("tree")
    }

    /// Map this profile onto a consumer's keys.
    pub fn overrides(&self, material: &str, variant: ConsumerVariant) -> Overrides {
        match variant.policy().dialect {
            SettingsDialect::Bambu => self.bambu_overrides(material),
            SettingsDialect::Slic3r => self.slic3r_overrides(material),
        }
    }

    fn common_print_keys(&self) -> Overrides {
        vec![
            ("layer_height".into(), SettingValue::scalar(self.layer_height)),
            ("initial_layer_height".into(), SettingValue::scalar(self.first_layer_height)),
            ("wall_loops".into(), SettingValue::scalar(self.perimeters)),
            ("top_shell_layers".into(), SettingValue::scalar(self.top_solid_layers)),
            ("bottom_shell_layers".into(), SettingValue::scalar(self.bottom_solid_layers)),
            (
                "sparse_infill_density".into(),
                SettingValue::scalar(format!("{}%", self.infill_percentage)),
            ),
            ("sparse_infill_pattern".into(), SettingValue::scalar(&self.infill_pattern)),
            (
                "enable_support".into(),
                SettingValue::scalar(if self.support_material { "1" } else { "0" }),
            ),
        ]
    }

    fn speed_keys(&self) -> Overrides {
        vec![
            ("default_speed".into(), SettingValue::scalar(self.print_speed)),
            ("initial_layer_speed".into(), SettingValue::scalar(self.first_layer_speed)),
            ("outer_wall_speed".into(), SettingValue::scalar(self.perimeter_speed)),
            ("inner_wall_speed".into(), SettingValue::scalar(self.perimeter_speed)),
            ("sparse_infill_speed".into(), SettingValue::scalar(self.infill_speed)),
            ("travel_speed".into(), SettingValue::scalar(self.travel_speed)),
        ]
    }

    fn bambu_overrides(&self, material: &str) -> Overrides {
        let tree = self.is_tree_support();

        let mut out = self.common_print_keys();
        out.extend([
            (
                "support_type".to_string(),
                SettingValue::scalar(if tree { "tree(auto)" } else { "normal(auto)" }),
            ),
            ("support_style".into(), SettingValue::scalar("default")),
            ("support_threshold_angle".into(), SettingValue::scalar(self.support_angle_threshold)),
            ("brim_type".into(), SettingValue::scalar("no_brim")),
        ]);
        out.extend(self.speed_keys());
        out.extend([
            ("retraction_length".to_string(), SettingValue::slot(self.retraction_length)),
            ("retraction_speed".into(), SettingValue::slot(self.retraction_speed)),
            ("nozzle_temperature".into(), SettingValue::slot(self.temperature)),
            ("hot_plate_temp".into(), SettingValue::slot(self.bed_temperature)),
            ("hot_plate_temp_initial_layer".into(), SettingValue::slot(self.bed_temperature)),
            ("fan_max_speed".into(), SettingValue::slot(self.cooling_fan_speed)),
            ("fan_min_speed".into(), SettingValue::slot(self.first_layer_fan_speed)),
            ("filament_type".into(), SettingValue::slot(material)),
            ("filament_settings_id".into(), SettingValue::slot(format!("{} @ECC", material))),
            ("resolution".into(), SettingValue::scalar("0.01")),
            ("detect_thin_wall".into(), SettingValue::scalar("1")),
        ]);

        if tree && self.support_material {
            let angle = self.tree_support_branch_angle;
            out.extend([
                ("tree_support_branch_angle".to_string(), SettingValue::scalar(angle)),
                ("tree_support_branch_angle_organic".into(), SettingValue::scalar(angle)),
                ("tree_support_branch_distance".into(), SettingValue::scalar("5")),
                ("tree_support_branch_distance_organic".into(), SettingValue::scalar("5")),
                ("tree_support_branch_diameter".into(), SettingValue::scalar("2")),
                ("tree_support_branch_diameter_organic".into(), SettingValue::scalar("2")),
                ("tree_support_wall_count".into(), SettingValue::scalar(self.tree_support_wall_count)),
                ("tree_support_adaptive_layer_height".into(), SettingValue::scalar("1")),
                ("tree_support_tip_diameter".into(), SettingValue::scalar("2")),
                ("tree_support_top_rate".into(), SettingValue::scalar("30%")),
            ]);
        }
        out
    }

    fn slic3r_overrides(&self, material: &str) -> Overrides {
        let tree = self.is_tree_support() && self.support_material;

        let mut out = self.common_print_keys();
        out.extend([
            ("support_threshold_angle".to_string(), SettingValue::scalar(self.support_angle_threshold)),
            ("brim_width".into(), SettingValue::scalar(self.brim_width)),
            ("brim_type".into(), SettingValue::scalar("outer_only")),
        ]);
        out.extend(self.speed_keys());
        out.extend([
            ("retraction_length".to_string(), SettingValue::scalar(self.retraction_length)),
            ("retraction_speed".into(), SettingValue::scalar(self.retraction_speed)),
            ("filament_type".into(), SettingValue::scalar(material)),
            ("nozzle_temperature".into(), SettingValue::scalar(self.temperature)),
            ("nozzle_temperature_initial_layer".into(), SettingValue::scalar(self.temperature)),
            ("bed_temperature".into(), SettingValue::scalar(self.bed_temperature)),
            ("fan_max_speed".into(), SettingValue::scalar(self.cooling_fan_speed)),
            ("fan_min_speed".into(), SettingValue::scalar(self.first_layer_fan_speed)),
        ]);

        if tree {
            out.extend([
                ("support_type".to_string(), SettingValue::scalar("tree")),
                ("support_style".into(), SettingValue::scalar("tree")),
                ("tree_support_branch_angle".into(), SettingValue::scalar(self.tree_support_branch_angle)),
                (
                    "tree_support_branch_distance".into(),
                    SettingValue::scalar(self.tree_support_branch_distance),
                ),
                ("tree_support_wall_count".into(), SettingValue::scalar(self.tree_support_wall_count)),
            ]);
        } else {
            out.extend([
                ("support_type".to_string(), SettingValue::scalar("normal")),
                ("support_style".into(), SettingValue::scalar("default")),
            ]);
        }
        out
    }
}
