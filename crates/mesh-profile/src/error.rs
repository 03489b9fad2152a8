//! Error types for profile generation with rich diagnostics.
//!
//! Every fatal error carries:
//! - a machine-readable code (`PROF-XXXX`)
//! - the pipeline [`Stage`] that failed
//! - the underlying cause (as `#[source]` where one exists)
//! - a recovery suggestion
//!
//! # Error Codes
//!
//! - `PROF-1xxx`: loading and file I/O
//! - `PROF-2xxx`: feature extraction and placement
//! - `PROF-3xxx`: package assembly and archive writing
//! - `PROF-4xxx`: settings baseline and configuration
//!
//! Non-fatal conditions found during extraction are reported as
//! [`GeometryWarning`] values inside the feature set instead.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for profile operations.
pub type ProfileResult<T> = Result<T, ProfileError>;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading and parsing the input mesh.
    Load,
    /// Computing geometric features.
    Extract,
    /// Solving the build-plate transform.
    Place,
    /// Building or writing the 3MF package.
    Package,
    /// Building the settings table from a baseline.
    Settings,
    /// Reading or writing configuration files.
    Config,
    /// Writing the plain artifacts (settings JSON, report).
    Output,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Extract => "extract",
            Stage::Place => "place",
            Stage::Package => "package",
            Stage::Settings => "settings",
            Stage::Config => "config",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Load (1xxx)
    /// PROF-1001: Failed to read file
    IoRead = 1001,
    /// PROF-1002: Failed to write file
    IoWrite = 1002,
    /// PROF-1003: Failed to parse file format
    ParseError = 1003,
    /// PROF-1004: Unsupported file extension
    UnsupportedFormat = 1004,
    /// PROF-1005: Mesh has no faces
    EmptyMesh = 1005,
    /// PROF-1006: Face references an out-of-range vertex
    InvalidVertexIndex = 1006,
    /// PROF-1007: Vertex has NaN or Infinity coordinate
    InvalidCoordinate = 1007,
    /// PROF-1008: Mesh has zero total area
    DegenerateGeometry = 1008,

    // Extract / place (2xxx)
    /// PROF-2001: Analysis parameter out of range
    InvalidParameter = 2001,
    /// PROF-2002: Plate and margin leave no usable area
    InvalidPlacement = 2002,

    // Package (3xxx)
    /// PROF-3001: Nothing to serialize
    EmptyGeometry = 3001,
    /// PROF-3002: Relationship or override names a missing part
    MissingPart = 3002,
    /// PROF-3003: Part has no content type
    UncoveredContentType = 3003,
    /// PROF-3004: Relationship graph is malformed
    InvalidRelationships = 3004,
    /// PROF-3005: Archive could not be written
    ArchiveWrite = 3005,
    /// PROF-3006: A part could not be encoded
    PartEncoding = 3006,

    // Settings / config (4xxx)
    /// PROF-4001: Baseline settings could not be parsed
    BaselineParse = 4001,
    /// PROF-4002: Configuration could not be parsed
    ConfigParse = 4002,
    /// PROF-4003: Configuration could not be serialized
    ConfigSerialize = 4003,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `PROF-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "PROF-1001",
            ErrorCode::IoWrite => "PROF-1002",
            ErrorCode::ParseError => "PROF-1003",
            ErrorCode::UnsupportedFormat => "PROF-1004",
            ErrorCode::EmptyMesh => "PROF-1005",
            ErrorCode::InvalidVertexIndex => "PROF-1006",
            ErrorCode::InvalidCoordinate => "PROF-1007",
            ErrorCode::DegenerateGeometry => "PROF-1008",
            ErrorCode::InvalidParameter => "PROF-2001",
            ErrorCode::InvalidPlacement => "PROF-2002",
            ErrorCode::EmptyGeometry => "PROF-3001",
            ErrorCode::MissingPart => "PROF-3002",
            ErrorCode::UncoveredContentType => "PROF-3003",
            ErrorCode::InvalidRelationships => "PROF-3004",
            ErrorCode::ArchiveWrite => "PROF-3005",
            ErrorCode::PartEncoding => "PROF-3006",
            ErrorCode::BaselineParse => "PROF-4001",
            ErrorCode::ConfigParse => "PROF-4002",
            ErrorCode::ConfigSerialize => "PROF-4003",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for profile errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Re-export the file from the original software.
    ReexportFile { format: Option<String> },
    /// Use a different file format.
    UseDifferentFormat { suggested: Vec<String> },
    /// Check the input or environment for specific problems.
    Check { checks: Vec<String> },
    /// Adjust parameters for the operation.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Manual intervention may be required.
    ManualIntervention { description: String },
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::ReexportFile { format } => match format {
                Some(fmt) => write!(
                    f,
                    "Try re-exporting the mesh as {} from the original software",
                    fmt
                ),
                None => write!(f, "Try re-exporting the mesh from the original software"),
            },
            RecoverySuggestion::UseDifferentFormat { suggested } => {
                write!(f, "Try using a different format: {}", suggested.join(", "))
            }
            RecoverySuggestion::Check { checks } => {
                write!(f, "Check: {}", checks.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::ManualIntervention { description } => {
                write!(f, "{}", description)
            }
        }
    }
}

/// Location information for profile errors.
#[derive(Debug, Clone)]
pub enum ErrorLocation {
    /// A specific vertex of the input mesh.
    Vertex { index: usize },
    /// A specific face of the input mesh.
    Face { index: usize },
    /// A file on disk.
    File { path: PathBuf },
    /// A part inside a package.
    Part { name: String },
}

impl std::fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorLocation::Vertex { index } => write!(f, "vertex {}", index),
            ErrorLocation::Face { index } => write!(f, "face {}", index),
            ErrorLocation::File { path } => write!(f, "{}", path.display()),
            ErrorLocation::Part { name } => write!(f, "package part {}", name),
        }
    }
}

/// Errors that can occur while turning a mesh into print artifacts.
#[derive(Debug, Error, Diagnostic)]
pub enum ProfileError {
    /// Error reading from a file.
    #[error("failed to read {path}")]
    #[diagnostic(
        code(profile::io::read),
        help("Check that the file exists and is readable. Try: ls -la {}", path.display())
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a plain output file.
    #[error("failed to write {path}")]
    #[diagnostic(
        code(profile::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing a mesh file.
    #[error("failed to parse mesh from {path}: {details}")]
    #[diagnostic(
        code(profile::load::parse),
        help("The file may be corrupted or in an unsupported variant. Try re-exporting it.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Unsupported file extension.
    #[error("unsupported mesh format: {extension:?}")]
    #[diagnostic(
        code(profile::load::format),
        help("Supported formats: STL, OBJ, PLY, 3MF")
    )]
    UnsupportedFormat { extension: Option<String> },

    /// The source produced no faces.
    #[error("mesh is empty: {details}")]
    #[diagnostic(
        code(profile::load::empty),
        help("The mesh must contain at least one triangle. Check that the file was exported correctly.")
    )]
    EmptyMesh { details: String },

    /// A face references a vertex that does not exist.
    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    #[diagnostic(code(profile::load::vertex_index))]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// A vertex coordinate is NaN or infinite.
    #[error("invalid coordinate at vertex {vertex_index}: {coordinate} is {value}")]
    #[diagnostic(
        code(profile::load::coordinate),
        help("Check for numerical issues in the source data.")
    )]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    /// The mesh has no area and was rejected by load options.
    #[error("degenerate geometry: {details}")]
    #[diagnostic(
        code(profile::load::degenerate),
        help("Every triangle in the mesh has zero area. Disable `reject_zero_area` to analyze it anyway.")
    )]
    DegenerateGeometry { details: String },

    /// An analysis parameter is outside its valid range.
    #[error("invalid parameter {name} = {value}: {reason}")]
    #[diagnostic(code(profile::extract::parameter))]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: String,
    },

    /// Plate and margin leave no usable area.
    #[error("invalid build plate placement: {details}")]
    #[diagnostic(
        code(profile::place::plate),
        help("The plate must be larger than twice the margin on both axes.")
    )]
    InvalidPlacement { details: String },

    /// Nothing to serialize into the model part.
    #[error("cannot package a mesh with zero triangles")]
    #[diagnostic(code(profile::package::empty))]
    EmptyGeometry,

    /// A relationship or content-type override names a part that is not in the package.
    #[error("{referrer} references missing part {target}")]
    #[diagnostic(code(profile::package::missing_part))]
    MissingPart { referrer: String, target: String },

    /// A part has neither a default nor an override content type.
    #[error("part {part} has no content type")]
    #[diagnostic(code(profile::package::content_type))]
    UncoveredContentType { part: String },

    /// The relationship graph violates the package model.
    #[error("invalid package relationships: {details}")]
    #[diagnostic(code(profile::package::relationships))]
    InvalidRelationships { details: String },

    /// The archive could not be written.
    #[error("failed to write package archive {path}")]
    #[diagnostic(
        code(profile::package::write),
        help("Check free disk space and write permissions for the output directory")
    )]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A part's payload could not be encoded.
    #[error("failed to encode package part {part}: {details}")]
    #[diagnostic(code(profile::package::encode))]
    PartEncoding { part: String, details: String },

    /// The baseline settings table could not be parsed.
    #[error("failed to parse settings baseline{}: {details}", .path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(profile::settings::baseline),
        help("The baseline must be a flat JSON object of string or string-array values.")
    )]
    BaselineParse {
        path: Option<PathBuf>,
        details: String,
    },

    /// A configuration file could not be parsed.
    #[error("failed to parse configuration{}: {details}", .path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default())]
    #[diagnostic(code(profile::config::parse))]
    ConfigParse {
        path: Option<PathBuf>,
        details: String,
    },

    /// A configuration could not be serialized.
    #[error("failed to serialize configuration: {details}")]
    #[diagnostic(code(profile::config::serialize))]
    ConfigSerialize { details: String },
}

impl ProfileError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ProfileError::IoRead { .. } => ErrorCode::IoRead,
            ProfileError::IoWrite { .. } => ErrorCode::IoWrite,
            ProfileError::ParseError { .. } => ErrorCode::ParseError,
            ProfileError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            ProfileError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            ProfileError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            ProfileError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            ProfileError::DegenerateGeometry { .. } => ErrorCode::DegenerateGeometry,
            ProfileError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            ProfileError::InvalidPlacement { .. } => ErrorCode::InvalidPlacement,
            ProfileError::EmptyGeometry => ErrorCode::EmptyGeometry,
            ProfileError::MissingPart { .. } => ErrorCode::MissingPart,
            ProfileError::UncoveredContentType { .. } => ErrorCode::UncoveredContentType,
            ProfileError::InvalidRelationships { .. } => ErrorCode::InvalidRelationships,
            ProfileError::ArchiveWrite { .. } => ErrorCode::ArchiveWrite,
            ProfileError::PartEncoding { .. } => ErrorCode::PartEncoding,
            ProfileError::BaselineParse { .. } => ErrorCode::BaselineParse,
            ProfileError::ConfigParse { .. } => ErrorCode::ConfigParse,
            ProfileError::ConfigSerialize { .. } => ErrorCode::ConfigSerialize,
        }
    }

    /// Returns the pipeline stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            ProfileError::IoRead { .. }
            | ProfileError::ParseError { .. }
            | ProfileError::UnsupportedFormat { .. }
            | ProfileError::EmptyMesh { .. }
            | ProfileError::InvalidVertexIndex { .. }
            | ProfileError::InvalidCoordinate { .. }
            | ProfileError::DegenerateGeometry { .. } => Stage::Load,
            ProfileError::InvalidParameter { .. } => Stage::Extract,
            ProfileError::InvalidPlacement { .. } => Stage::Place,
            ProfileError::EmptyGeometry
            | ProfileError::MissingPart { .. }
            | ProfileError::UncoveredContentType { .. }
            | ProfileError::InvalidRelationships { .. }
            | ProfileError::ArchiveWrite { .. }
            | ProfileError::PartEncoding { .. } => Stage::Package,
            ProfileError::BaselineParse { .. } => Stage::Settings,
            ProfileError::ConfigParse { .. } | ProfileError::ConfigSerialize { .. } => {
                Stage::Config
            }
            ProfileError::IoWrite { .. } => Stage::Output,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            ProfileError::IoRead { .. } => RecoverySuggestion::Check {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            ProfileError::IoWrite { .. } | ProfileError::ArchiveWrite { .. } => {
                RecoverySuggestion::Check {
                    checks: vec![
                        "directory exists".into(),
                        "write permissions".into(),
                        "free disk space".into(),
                    ],
                }
            }
            ProfileError::ParseError { .. } => RecoverySuggestion::ReexportFile {
                format: Some("binary STL or 3MF".into()),
            },
            ProfileError::UnsupportedFormat { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["STL".into(), "OBJ".into(), "PLY".into(), "3MF".into()],
            },
            ProfileError::EmptyMesh { .. } | ProfileError::DegenerateGeometry { .. } => {
                RecoverySuggestion::ReexportFile { format: None }
            }
            ProfileError::InvalidVertexIndex { .. } | ProfileError::InvalidCoordinate { .. } => {
                RecoverySuggestion::Check {
                    checks: vec!["mesh export settings".into(), "export precision".into()],
                }
            }
            ProfileError::InvalidParameter { name, .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![((*name).into(), "use a value in range".into())],
            },
            ProfileError::InvalidPlacement { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![
                    ("plate_width".into(), "use the printer's bed size".into()),
                    ("margin".into(), "try a smaller value".into()),
                ],
            },
            ProfileError::EmptyGeometry => RecoverySuggestion::ReexportFile { format: None },
            ProfileError::MissingPart { .. }
            | ProfileError::UncoveredContentType { .. }
            | ProfileError::InvalidRelationships { .. }
            | ProfileError::PartEncoding { .. } => RecoverySuggestion::ManualIntervention {
                description: "This is a packaging defect; please report it with the consumer variant used"
                    .into(),
            },
            ProfileError::BaselineParse { .. } => RecoverySuggestion::Check {
                checks: vec!["baseline is a flat JSON object".into()],
            },
            ProfileError::ConfigParse { .. } | ProfileError::ConfigSerialize { .. } => {
                RecoverySuggestion::Check {
                    checks: vec!["configuration syntax".into(), "field names".into()],
                }
            }
        }
    }

    /// Returns location information if available.
    pub fn location(&self) -> Option<ErrorLocation> {
        match self {
            ProfileError::InvalidVertexIndex { face_index, .. } => {
                Some(ErrorLocation::Face { index: *face_index })
            }
            ProfileError::InvalidCoordinate { vertex_index, .. } => Some(ErrorLocation::Vertex {
                index: *vertex_index,
            }),
            ProfileError::IoRead { path, .. }
            | ProfileError::IoWrite { path, .. }
            | ProfileError::ParseError { path, .. }
            | ProfileError::ArchiveWrite { path, .. } => {
                Some(ErrorLocation::File { path: path.clone() })
            }
            ProfileError::BaselineParse { path, .. } | ProfileError::ConfigParse { path, .. } => {
                path.clone().map(|path| ErrorLocation::File { path })
            }
            ProfileError::MissingPart { target, .. } => Some(ErrorLocation::Part {
                name: target.clone(),
            }),
            ProfileError::UncoveredContentType { part }
            | ProfileError::PartEncoding { part, .. } => {
                Some(ErrorLocation::Part { name: part.clone() })
            }
            _ => None,
        }
    }

    // Constructor helpers for common error patterns

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProfileError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProfileError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a ParseError.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        ProfileError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create an EmptyMesh error.
    pub fn empty_mesh(details: impl Into<String>) -> Self {
        ProfileError::EmptyMesh {
            details: details.into(),
        }
    }

    /// Create an InvalidVertexIndex error.
    pub fn invalid_vertex_index(face_index: usize, vertex_index: u32, vertex_count: usize) -> Self {
        ProfileError::InvalidVertexIndex {
            face_index,
            vertex_index,
            vertex_count,
        }
    }

    /// Create an InvalidCoordinate error.
    pub fn invalid_coordinate(vertex_index: usize, coordinate: &'static str, value: f64) -> Self {
        ProfileError::InvalidCoordinate {
            vertex_index,
            coordinate,
            value,
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(name: &'static str, value: f64, reason: impl Into<String>) -> Self {
        ProfileError::InvalidParameter {
            name,
            value,
            reason: reason.into(),
        }
    }

    /// Create an InvalidPlacement error.
    pub fn invalid_placement(details: impl Into<String>) -> Self {
        ProfileError::InvalidPlacement {
            details: details.into(),
        }
    }

    /// Create a MissingPart error.
    pub fn missing_part(referrer: impl Into<String>, target: impl Into<String>) -> Self {
        ProfileError::MissingPart {
            referrer: referrer.into(),
            target: target.into(),
        }
    }

    /// Wrap a zip-level failure as an ArchiveWrite error.
    pub fn archive_write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        ProfileError::ArchiveWrite {
            path: path.into(),
            source: std::io::Error::other(err.to_string()),
        }
    }

    /// Create a PartEncoding error.
    pub fn part_encoding(part: impl Into<String>, details: impl std::fmt::Display) -> Self {
        ProfileError::PartEncoding {
            part: part.into(),
            details: details.to_string(),
        }
    }
}

/// Non-fatal conditions recorded while extracting features.
///
/// Values affected by a warning are clamped to 0 instead of producing NaN or
/// infinity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryWarning {
    /// Total surface area is zero; density and surface metrics are 0.
    ZeroSurfaceArea,
    /// Enclosed volume is zero.
    ZeroVolume,
    /// Some faces have no defined normal and were skipped for overhang counts.
    DegenerateFaces { count: usize },
    /// A computed value was not finite and was replaced by 0.
    NonFiniteValue { field: String },
    /// Some edges are shared by more than two faces; volume may be unreliable.
    NonManifoldEdges { count: usize },
}

impl GeometryWarning {
    /// Returns a code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            GeometryWarning::ZeroSurfaceArea => "PROF-2101",
            GeometryWarning::ZeroVolume => "PROF-2102",
            GeometryWarning::DegenerateFaces { .. } => "PROF-2103",
            GeometryWarning::NonFiniteValue { .. } => "PROF-2104",
            GeometryWarning::NonManifoldEdges { .. } => "PROF-2105",
        }
    }
}

impl std::fmt::Display for GeometryWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryWarning::ZeroSurfaceArea => {
                write!(f, "mesh has zero surface area; density metrics clamped to 0")
            }
            GeometryWarning::ZeroVolume => write!(f, "mesh encloses zero volume"),
            GeometryWarning::DegenerateFaces { count } => {
                write!(f, "{} degenerate faces excluded from overhang analysis", count)
            }
            GeometryWarning::NonFiniteValue { field } => {
                write!(f, "{} was not finite and was clamped to 0", field)
            }
            GeometryWarning::NonManifoldEdges { count } => {
                write!(f, "{} edges are shared by more than two faces", count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ProfileError::invalid_vertex_index(5, 100, 50);
        assert_eq!(err.code(), ErrorCode::InvalidVertexIndex);
        assert_eq!(err.code().as_str(), "PROF-1006");
        assert_eq!(ProfileError::EmptyGeometry.code().as_str(), "PROF-3001");
    }

    #[test]
    fn test_stages() {
        assert_eq!(ProfileError::empty_mesh("no faces").stage(), Stage::Load);
        assert_eq!(ProfileError::invalid_placement("x").stage(), Stage::Place);
        assert_eq!(ProfileError::EmptyGeometry.stage(), Stage::Package);
        assert_eq!(
            ProfileError::archive_write("out.3mf", "disk full").stage(),
            Stage::Package
        );
        assert_eq!(Stage::Package.to_string(), "package");
    }

    #[test]
    fn test_location_info() {
        let err = ProfileError::invalid_vertex_index(5, 100, 50);
        match err.location() {
            Some(ErrorLocation::Face { index }) => assert_eq!(index, 5),
            other => panic!("Expected Face location, got {:?}", other),
        }

        let err = ProfileError::missing_part("_rels/.rels", "3D/3dmodel.model");
        assert_eq!(
            err.location().map(|l| l.to_string()),
            Some("package part 3D/3dmodel.model".to_string())
        );
    }

    #[test]
    fn test_error_display() {
        let err = ProfileError::invalid_vertex_index(5, 100, 50);
        let display = format!("{}", err);
        assert!(display.contains("face 5"));
        assert!(display.contains("vertex 100"));
        assert!(display.contains("50 vertices"));

        let err = ProfileError::BaselineParse {
            path: None,
            details: "expected object".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to parse settings baseline: expected object"
        );
    }

    #[test]
    fn test_archive_write_keeps_cause() {
        use std::error::Error as _;
        let err = ProfileError::archive_write("out.3mf", "no space left on device");
        let cause = err.source().map(|s| s.to_string());
        assert_eq!(cause.as_deref(), Some("no space left on device"));
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let json = serde_json::to_string(&GeometryWarning::DegenerateFaces { count: 2 })
            .expect("serialize");
        assert_eq!(json, r#"{"kind":"degenerate_faces","count":2}"#);
        assert_eq!(GeometryWarning::ZeroSurfaceArea.code(), "PROF-2101");
    }
}
