//! Geometric feature extraction and 3MF print package assembly.
//!
//! This crate turns a raw triangle mesh into the artifacts a slicer needs:
//! a set of deterministic geometric features, a flat settings table, and a
//! 3MF (Open Packaging Conventions) archive with the mesh placed on the
//! build plate.
//!
//! # Features
//!
//! - **File I/O**: Load STL, OBJ, PLY, and 3MF; multi-object files are
//!   concatenated into one mesh
//! - **Feature extraction**: Volume, surface area, face density, overhang
//!   percentages and support decisions, wall and surface heuristics,
//!   orientation hints, content fingerprint
//! - **Placement**: Uniform scale-to-fit and centering on a rectangular plate
//! - **Settings**: Baseline + override merge with per-consumer key mapping
//! - **Packaging**: Part set, content types, relationship graph, validation,
//!   and atomic archive writes for core 3MF, Orca, and Elegoo Orca
//!
//! # Units and Scale
//!
//! **This library assumes millimeter (mm) units.** Detail thresholds are in
//! faces per mm², wall estimates and plate sizes are in mm.
//!
//! # Coordinate System
//!
//! Right-handed, with **+Z as the print "up" axis**. Face winding is
//! counter-clockwise when viewed from outside, so normals point outward by
//! the right-hand rule. Overhang angles are measured from the outward normal
//! against +Z.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_profile::{
//!     BuildPlate, ConsumerVariant, FeatureParams, Mesh, PackageOptions, RuleBasedRecommender,
//!     SettingsTable, Baseline, export_package, extract_features,
//! };
//! use std::path::Path;
//!
//! let mesh = Mesh::load("bracket.stl").unwrap();
//! let features = extract_features(&mesh, &FeatureParams::default());
//! println!("{}", features.summary());
//!
//! let rec = RuleBasedRecommender::default().recommend_profile(&features, &[]);
//! let variant = ConsumerVariant::ElegooOrca;
//! let settings = SettingsTable::for_consumer(&Baseline::empty(), &rec.profile, "PLA", variant);
//!
//! let transform = mesh.solve_placement(&BuildPlate::square(220.0), 5.0).unwrap();
//! let options = PackageOptions::default();
//! export_package(&mesh, &transform, &settings, variant, &options, Path::new("bracket.3mf")).unwrap();
//! ```
//!
//! For the whole flow (artifacts written side by side, packaging failure
//! isolated) see [`pipeline::run_job`].

mod builder;
mod error;
mod types;

pub mod tracing_ext;

pub mod adjacency;
pub mod assemble;
pub mod complexity;
pub mod config;
pub mod consumer;
pub mod features;
pub mod fingerprint;
pub mod io;
pub mod measure;
pub mod overhang;
pub mod package;
pub mod pipeline;
pub mod printability;
pub mod recommend;
pub mod report;
pub mod settings;
pub mod transform;

// Re-export core types at crate root
pub use builder::MeshBuilder;
pub use error::{
    ErrorCode, ErrorLocation, GeometryWarning, ProfileError, ProfileResult, RecoverySuggestion,
    Stage,
};
pub use types::{BoundingBox, Mesh, Triangle};

pub use adjacency::EdgeMap;
pub use io::{LoadOptions, MeshFormat, load_mesh, load_mesh_with};

// Feature extraction
pub use complexity::{ComplexityMetrics, DetailLevel, DetailThresholds};
pub use features::{FeatureParams, FeatureSet, extract_features};
pub use fingerprint::fingerprint;
pub use measure::Dimensions;
pub use overhang::{OverhangMetrics, OverhangParams, SupportComplexity, SupportPolicy};
pub use printability::{
    Axis, OrientationHint, RotationAdvice, SurfaceMetrics, SurfaceType, WallEstimate, WallParams,
    WallType,
};

// Placement and packaging
pub use assemble::{PackageOptions, assemble_package, export_package};
pub use consumer::{ConsumerPolicy, ConsumerVariant, SettingsDialect};
pub use package::{ContentTypes, PackageDocument, Relationship, write_package};
pub use transform::{AffineTransform, BuildPlate, solve_placement};

// Settings and recommendations
pub use recommend::{
    CaseStore, CollaboratorError, ModelAnalysis, PriorCase, Recommendation, RecommendationSource,
    Recommender, RuleBasedRecommender, case_search_text, fallback_recommendation, finished_case,
    parse_recommendation, recommend_with, record_case_or_skip,
};
pub use settings::{Baseline, Overrides, ProfileRecord, SettingValue, SettingsTable};

// Orchestration
pub use config::{OutputParams, PlacementParams, ProfileConfig};
pub use pipeline::{JobOutcome, ProfileJob, run_job};
pub use report::{reference_profile_json, render_report};
