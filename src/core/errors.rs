//! Shared error types for the engine

use crate::core::types::{PatternKind, SourceLocation};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the scope & alias analyzer. Bindings affected by these
/// are reported and excluded from matching, never guessed at.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// The source unit could not be parsed
    #[error("parse error in {file} at line {line}: {message}")]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// The analyzer exceeded its per-unit time budget
    #[error("analysis of {file} timed out after {timeout_ms}ms")]
    Timeout { file: PathBuf, timeout_ms: u64 },

    /// The unit exceeds the configured size ceiling
    #[error("{file} is {bytes} bytes, over the {max_bytes} byte limit")]
    UnitTooLarge {
        file: PathBuf,
        bytes: usize,
        max_bytes: usize,
    },

    /// A binding's mutation pattern cannot be decided statically
    /// (e.g. reassigned through dynamic reflection)
    #[error("mutation of '{binding}' at line {}:{} is dynamically ambiguous: {detail}", loc.line, loc.column)]
    AmbiguousMutation {
        binding: String,
        loc: SourceLocation,
        detail: String,
    },
}

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Two catalog kinds tied under the priority order; reported for manual
    /// review, never auto-picked
    #[error("classification ambiguous for group {group_id}: {first} and {second} tie")]
    ClassificationAmbiguous {
        group_id: usize,
        first: PatternKind,
        second: PatternKind,
    },

    /// The plan would alter a public contract; flagged, not applied
    #[error("plan blocked for group {group_id}: {detail}")]
    PlanBlocked { group_id: usize, detail: String },

    /// Post-rewrite replay or fixpoint check failed; rewrite discarded
    #[error("preservation violated for group {group_id}: {detail}")]
    PreservationViolation { group_id: usize, detail: String },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn preservation(group_id: usize, detail: impl Into<String>) -> Self {
        Self::PreservationViolation {
            group_id,
            detail: detail.into(),
        }
    }
}

/// Result type alias using the engine error type
pub type Result<T> = std::result::Result<T, Error>;
