//! Tracing helpers for pipeline stages.
//!
//! The library only emits events; installing a subscriber is up to the
//! application:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//!
//! // RUST_LOG=mesh_profile=debug for per-stage detail,
//! // RUST_LOG=mesh_profile::timing=info for stage timings only.
//! ```
//!
//! # Log Levels
//!
//! - **WARN**: recoverable conditions (degenerate geometry, isolated packaging failures)
//! - **INFO**: stage summaries and timing
//! - **DEBUG**: counts, bounds, intermediate values
//! - **TRACE**: per-part detail while assembling packages

use std::time::Instant;
use tracing::{Span, debug, info, trace};

use crate::features::FeatureSet;
use crate::types::Mesh;

/// A stage timer that logs its duration on drop.
///
/// ```rust,ignore
/// fn extract(mesh: &Mesh) {
///     let _timer = OperationTimer::new("extract_features");
///     // ... work ...
/// } // duration logged here
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTimer {
    /// Create a new operation timer.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("profile_stage", stage = name);
        debug!(target: "mesh_profile::timing", stage = name, "Starting stage");
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Create a timer that records the mesh size on its span.
    pub fn for_mesh(name: &'static str, mesh: &Mesh) -> Self {
        let span = tracing::info_span!(
            "profile_stage",
            stage = name,
            faces = mesh.face_count(),
            vertices = mesh.vertex_count()
        );
        debug!(
            target: "mesh_profile::timing",
            stage = name,
            faces = mesh.face_count(),
            vertices = mesh.vertex_count(),
            "Starting stage"
        );
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// The span for this stage.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        info!(
            target: "mesh_profile::timing",
            stage = self.name,
            elapsed_ms = format!("{:.2}", self.elapsed_ms()),
            "Stage completed"
        );
    }
}

/// Log mesh size and extents at debug level.
pub fn log_mesh_stats(mesh: &Mesh, context: &str) {
    let dims = mesh.bounds().map(|b| b.extents()).unwrap_or_default();
    debug!(
        target: "mesh_profile::mesh_state",
        context = context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        dimensions = format!("{:.2} x {:.2} x {:.2}", dims.x, dims.y, dims.z),
        "Mesh state"
    );
}

/// Log the decisions a feature set will drive.
pub fn log_feature_summary(features: &FeatureSet) {
    info!(
        target: "mesh_profile::features",
        fingerprint = %features.fingerprint,
        detail_level = %features.complexity.detail_level,
        watertight = features.complexity.is_watertight,
        overhang_pct = format!("{:.1}", features.overhangs.overhang_percentage),
        needs_supports = features.overhangs.needs_supports,
        tree_support = features.overhangs.recommend_tree_support,
        warnings = features.warnings.len(),
        "Features extracted"
    );
}

/// Log one part written into a package.
pub fn log_package_part(name: &str, bytes: usize) {
    trace!(
        target: "mesh_profile::package",
        part = name,
        bytes = bytes,
        "Package part"
    );
}

/// Log an artifact written to disk.
pub fn log_artifact(kind: &str, path: &std::path::Path, bytes: u64) {
    info!(
        target: "mesh_profile::output",
        kind = kind,
        path = %path.display(),
        bytes = bytes,
        "Artifact written"
    );
}
