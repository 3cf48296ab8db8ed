//! Error types for the atlas-sourcemaps crate.
//!
//! Acquisition failures never show up here: they are localized to individual
//! result records. Only contract violations and session-level failures of
//! the enable/disable commands propagate out of the collector.

use atlas_browser::SessionError;
use thiserror::Error;

/// Errors from the collection lifecycle.
#[derive(Debug, Error)]
pub enum CollectError {
    /// `arm` was called twice within one run.
    #[error("accumulator is already armed for this run")]
    AlreadyArmed,

    /// `finalize` was called before `arm`, or twice.
    #[error("accumulator was finalized without being armed")]
    NotArmed,

    /// The event pump task terminated abnormally.
    #[error("event pump task failed: {0}")]
    Pump(String),

    /// A session-level command (domain enable/disable) failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}
