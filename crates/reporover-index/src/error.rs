//! Error types for reporover-index.

/// Errors that can occur while ingesting, indexing, or persisting a corpus.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files or the corpus store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// LLM provider error (embedding).
    #[error("LLM error: {0}")]
    Llm(#[from] reporover_llm::LlmError),

    /// Code host could not serve the tree or a blob.
    #[error("code host error: {0}")]
    Host(String),

    /// The repository reference could not be understood.
    #[error("invalid repository reference: {0}")]
    InvalidRepo(String),

    /// Blob content was not valid base64 or not UTF-8 text.
    #[error("decode failed for {path}: {reason}")]
    Decode { path: String, reason: String },

    /// Tree-sitter parsing error.
    #[error("parse failed: {0}")]
    Parse(String),

    /// Corpus persistence failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors raised by a corpus store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus file {path} is not valid JSON: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize corpus: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that abort a whole ingestion run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The repository tree could not be listed.
    #[error("failed to fetch tree for {repo}: {source}")]
    Fetch {
        repo: String,
        #[source]
        source: IndexError,
    },
}
