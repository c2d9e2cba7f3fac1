use std::path::PathBuf;

use thiserror::Error;

use crate::category::Category;
use crate::validator::ValidationViolation;

/// Failures of the schema provider. A missing category is reported to the
/// caller; a single unreadable template inside an existing category is
/// skipped with a warning instead.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("no schema folder exists for category `{category}`")]
    CategoryNotFound { category: Category },
    #[error("category `{category}` contains no parseable templates")]
    EmptyCategory { category: Category },
    #[error("could not read schema directory `{path}`: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum TemplateParseError {
    #[error("template is not valid JSON after comment stripping: {0}")]
    Json(#[from] serde_json::Error),
    #[error("template parsed to an empty field map")]
    EmptyTemplate,
}

/// Engine-level error taxonomy. None of these are fatal to a session: the
/// extraction and derivation variants are degraded paths that the
/// orchestrator absorbs, and validation failures are replaced by the
/// deterministic fallback turn before anything reaches the user.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("no active session with id `{session_id}`")]
    SessionNotFound { session_id: String },
    #[error("extraction output could not be parsed: {detail}")]
    ExtractionParseFailure { detail: String },
    #[error("derived field computation skipped for `{field}`: {detail}")]
    DerivedComputeFailure { field: String, detail: String },
    #[error(transparent)]
    Validation(#[from] ValidationViolation),
}

impl EngineError {
    /// Message safe to surface to the citizen. Internal detail stays in logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Schema(_) => "This form category is not available right now.",
            Self::SessionNotFound { .. } => {
                "Your session could not be found. Please start the form again."
            }
            Self::ExtractionParseFailure { .. }
            | Self::DerivedComputeFailure { .. }
            | Self::Validation(_) => "Sorry, something went wrong. Could you repeat that?",
        }
    }
}
