use reporover_index::{IngestError, StoreError};
use reporover_llm::LlmError;

/// Failure of a single grounded generation call.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Nothing citable could be put in front of the model.
    #[error("insufficient context: {0}")]
    InsufficientContext(String),

    /// Every attempt failed to produce a valid artifact.
    #[error("generation failed after {attempts} attempt(s): {}", .errors.join("; "))]
    Failed {
        attempts: u32,
        last_raw: Option<String>,
        errors: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TxLogError {
    #[error("transaction log IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transaction log JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transaction log {path} is empty")]
    Empty { path: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the tutor facade.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("repository {0} has not been ingested")]
    NotIngested(String),

    #[error("no records for {path} in {repo_id}")]
    UnknownFile { repo_id: String, path: String },

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}
