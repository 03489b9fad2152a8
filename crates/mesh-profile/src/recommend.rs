//! Recommendation boundary.
//!
//! The recommender and the similar-case store are external collaborators
//! reached through [`Recommender`] and [`CaseStore`]. Neither can fail a
//! job: a store error yields no prior cases (or an unrecorded case), and a
//! recommender error or an unparseable response yields
//! [`fallback_recommendation`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::complexity::DetailLevel;
use crate::features::FeatureSet;
use crate::settings::ProfileRecord;

/// Failure reported by an external collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator request failed: {0}")]
    Request(String),
}

/// Where a recommendation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    #[default]
    Ai,
    RuleBased,
    Fallback,
}

/// Qualitative assessment accompanying a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelAnalysis {
    pub model_type: String,
    pub complexity_assessment: String,
    pub print_challenges: Vec<String>,
    pub key_considerations: Vec<String>,
    /// Start of the unparseable response, kept for diagnosis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_ai_response: Option<String>,
}

impl Default for ModelAnalysis {
    fn default() -> Self {
        Self {
            model_type: "unknown".to_string(),
            complexity_assessment: "medium".to_string(),
            print_challenges: Vec::new(),
            key_considerations: Vec::new(),
            raw_ai_response: None,
        }
    }
}

/// A recommended profile plus its rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub analysis: ModelAnalysis,
    #[serde(default)]
    pub profile: ProfileRecord,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default = "default_material")]
    pub material_suggestion: String,
    #[serde(default = "default_quality")]
    pub estimated_quality: String,
    #[serde(default = "default_time_factor")]
    pub estimated_print_time_factor: f64,
    /// Fingerprint of the mesh this was produced for.
    #[serde(default)]
    pub model_hash: String,
    #[serde(default)]
    pub source: RecommendationSource,
}

fn default_material() -> String {
    "PLA".to_string()
}

fn default_quality() -> String {
    "standard".to_string()
}

fn default_time_factor() -> f64 {
    1.0
}

/// A previously recorded job returned by a [`CaseStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorCase {
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub recommendation: Option<Recommendation>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
}

/// Produces a raw (usually JSON) recommendation for a feature set.
pub trait Recommender {
    fn recommend(
        &self,
        features: &FeatureSet,
        similar: &[PriorCase],
    ) -> Result<String, CollaboratorError>;
}

/// Similarity lookup over previously recorded jobs.
pub trait CaseStore {
    fn find_similar(&self, query: &str, limit: usize) -> Result<Vec<PriorCase>, CollaboratorError>;

    /// Store a finished case so later jobs can find it.
    fn record(&self, case: &PriorCase) -> Result<(), CollaboratorError>;
}

/// Query the store, treating absence or failure as "no similar cases".
pub fn find_similar_or_empty(
    store: Option<&dyn CaseStore>,
    features: &FeatureSet,
    limit: usize,
) -> Vec<PriorCase> {
    let Some(store) = store else {
        return Vec::new();
    };
    match store.find_similar(&features.search_text(), limit) {
        Ok(cases) => {
            debug!(count = cases.len(), "Similar cases found");
            cases
        }
        Err(e) => {
            warn!(error = %e, "Similar case search failed; continuing without prior cases");
            Vec::new()
        }
    }
}

/// Text representation of a finished case, as recorded in a store.
pub fn case_search_text(features: &FeatureSet, rec: &Recommendation) -> String {
    let mut parts = features.search_parts();
    parts.push(format!("Type: {}", rec.analysis.model_type));
    parts.push(format!("Complexity: {}", rec.analysis.complexity_assessment));
    parts.push(format!("Layer height: {}mm", rec.profile.layer_height));
    parts.push(format!("Infill: {}%", rec.profile.infill_percentage));
    parts.push(format!("Speed: {}mm/s", rec.profile.print_speed));
    parts.join(" | ")
}

/// Case id: `case_<YYYYmmdd_HHMMSS>_<first 8 fingerprint chars>`.
pub fn case_id(features: &FeatureSet, at: DateTime<Utc>) -> String {
    let hash: String = features.fingerprint.chars().take(8).collect();
    format!("case_{}_{}", at.format("%Y%m%d_%H%M%S"), hash)
}

/// The record a finished job leaves in a store.
pub fn finished_case(features: &FeatureSet, rec: &Recommendation, at: DateTime<Utc>) -> PriorCase {
    PriorCase {
        id: case_id(features, at),
        timestamp: Some(at.to_rfc3339()),
        search_text: case_search_text(features, rec),
        recommendation: Some(rec.clone()),
        feedback: None,
        success: None,
    }
}

/// Record a finished job, returning the case id. A missing store or a store
/// failure records nothing.
pub fn record_case_or_skip(
    store: Option<&dyn CaseStore>,
    features: &FeatureSet,
    rec: &Recommendation,
    at: DateTime<Utc>,
) -> Option<String> {
    let store = store?;
    let case = finished_case(features, rec, at);
    match store.record(&case) {
        Ok(()) => {
            info!(case = %case.id, "Case recorded");
            Some(case.id)
        }
        Err(e) => {
            warn!(error = %e, "Recording the case failed; continuing");
            None
        }
    }
}

/// Remove a surrounding Markdown code fence, if any.
///
/// With a ```` ```json ```` fence the body runs from after the tag to the last
/// fence; a bare ```` ``` ```` fence is handled the same way.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let body_start = if let Some(pos) = text.find("```json") {
        pos + "```json".len()
    } else if let Some(pos) = text.find("```") {
        pos + "```".len()
    } else {
        return text;
    };
    let body_end = match text.rfind("```") {
        Some(end) if end >= body_start => end,
        _ => text.len(),
    };
    text[body_start..body_end].trim()
}

/// Parse a raw response. Never fails: unparseable text yields the fallback.
pub fn parse_recommendation(text: &str, features: &FeatureSet) -> Recommendation {
    let body = strip_code_fence(text);
    match serde_json::from_str::<Recommendation>(body) {
        Ok(mut rec) => {
            rec.model_hash = features.fingerprint.clone();
            debug!(source = ?rec.source, "Parsed recommendation");
            rec
        }
        Err(e) => {
            warn!(error = %e, "Recommendation was not valid JSON; using fallback profile");
            fallback_recommendation(features, body)
        }
    }
}

/// Safe defaults driven only by the overhang decisions.
pub fn fallback_recommendation(features: &FeatureSet, raw_response: &str) -> Recommendation {
    let tree = features.overhangs.recommend_tree_support;
    let profile = ProfileRecord {
        support_material: features.overhangs.needs_supports,
        support_type: if tree { "tree_auto" } else { "normal" }.to_string(),
        support_style: if tree { "tree" } else { "default" }.to_string(),
        ..ProfileRecord::default()
    };

    Recommendation {
        analysis: ModelAnalysis {
            model_type: "unknown".to_string(),
            complexity_assessment: features.complexity.detail_level.to_string(),
            print_challenges: vec!["automatic_analysis_failed".to_string()],
            key_considerations: vec!["using_fallback_profile".to_string()],
            raw_ai_response: Some(raw_response.chars().take(500).collect()),
        },
        profile,
        reasoning: "Fallback profile generated due to AI parsing error. Using safe default parameters."
            .to_string(),
        material_suggestion: default_material(),
        estimated_quality: default_quality(),
        estimated_print_time_factor: 1.0,
        model_hash: features.fingerprint.clone(),
        source: RecommendationSource::Fallback,
    }
}

/// Look up prior cases, ask the recommender, and parse its answer. Every
/// collaborator failure degrades to the fallback.
pub fn recommend_with(
    recommender: &dyn Recommender,
    store: Option<&dyn CaseStore>,
    features: &FeatureSet,
    similar_limit: usize,
) -> Recommendation {
    let similar = find_similar_or_empty(store, features, similar_limit);
    match recommender.recommend(features, &similar) {
        Ok(text) => parse_recommendation(&text, features),
        Err(e) => {
            warn!(error = %e, "Recommender failed; using fallback profile");
            fallback_recommendation(features, "")
        }
    }
}

/// Deterministic recommender driven by the extracted features.
#[derive(Debug, Clone)]
pub struct RuleBasedRecommender {
    pub material: String,
}

impl Default for RuleBasedRecommender {
    fn default() -> Self {
        Self {
            material: default_material(),
        }
    }
}

impl RuleBasedRecommender {
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
        }
    }

    /// Build the recommendation directly.
    pub fn recommend_profile(&self, features: &FeatureSet, similar: &[PriorCase]) -> Recommendation {
        let detail = features.complexity.detail_level;
        let oh = &features.overhangs;
        let thin = features.wall_analysis.has_thin_walls;
        let fine = matches!(detail, DetailLevel::VeryHigh | DetailLevel::High);

        let mut profile = ProfileRecord {
            layer_height: match detail {
                DetailLevel::VeryHigh => 0.12,
                DetailLevel::High => 0.16,
                _ => 0.2,
            },
            support_material: oh.needs_supports,
            support_type: if oh.recommend_tree_support { "tree_auto" } else { "normal" }.to_string(),
            support_style: if oh.recommend_tree_support { "tree" } else { "default" }.to_string(),
            ..ProfileRecord::default()
        };
        if fine {
            profile.print_speed = 45.0;
            profile.perimeter_speed = 30.0;
        }
        if thin {
            profile.perimeters = 2;
            profile.first_layer_speed = 15.0;
        }
        if features.dimensions.max_dimension < 30.0 {
            profile.infill_percentage = 15.0;
        }

        let mut challenges = Vec::new();
        if oh.needs_supports {
            challenges.push(format!("overhangs_{:.0}_percent", oh.overhang_percentage));
        }
        if thin {
            challenges.push("thin_walls".to_string());
        }
        if fine {
            challenges.push("fine_detail".to_string());
        }
        if !features.complexity.is_watertight {
            challenges.push("not_watertight".to_string());
        }

        let mut considerations = vec![format!("orientation_up_axis_{}", features.orientation.suggested_up_axis)];
        if oh.recommend_tree_support {
            considerations.push("tree_supports_for_severe_overhangs".to_string());
        }
        if !similar.is_empty() {
            considerations.push(format!("{}_similar_cases_considered", similar.len()));
        }

        let model_type = if features.dimensions.max_dimension < 50.0 && fine {
            "miniature"
        } else if features.complexity.is_watertight && !fine {
            "functional_part"
        } else {
            "decorative"
        };

        let reasoning = format!(
            "Layer height {} mm for {} detail. {}",
            profile.layer_height,
            detail,
            if oh.needs_supports {
                format!(
                    "{:.1}% of faces are overhangs, so {} supports are enabled.",
                    oh.overhang_percentage,
                    if oh.recommend_tree_support { "tree" } else { "normal" }
                )
            } else {
                "Overhangs are minor, so supports are disabled.".to_string()
            }
        );

        info!(
            model_type,
            layer_height = profile.layer_height,
            supports = profile.support_material,
            "Rule-based recommendation"
        );

        Recommendation {
            analysis: ModelAnalysis {
                model_type: model_type.to_string(),
                complexity_assessment: detail.to_string(),
                print_challenges: challenges,
                key_considerations: considerations,
                raw_ai_response: None,
            },
            profile,
            reasoning,
            material_suggestion: self.material.clone(),
            estimated_quality: if fine { "high" } else { "standard" }.to_string(),
            estimated_print_time_factor: if fine { 1.5 } else { 1.0 },
            model_hash: features.fingerprint.clone(),
            source: RecommendationSource::RuleBased,
        }
    }
}

impl Recommender for RuleBasedRecommender {
    fn recommend(
        &self,
        features: &FeatureSet,
        similar: &[PriorCase],
    ) -> Result<String, CollaboratorError> {
        serde_json::to_string(&self.recommend_profile(features, similar))
            .map_err(|e| CollaboratorError::Request(e.to_string()))
    }
}
