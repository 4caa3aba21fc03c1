//! Repository ingestion, language-aware extraction, embedding retrieval and
//! import graphs.
//!
//! Ingestion is sequential per repository: list the tree, classify and select
//! files, fetch and decode blobs, drop secret-bearing content, then extract
//! context records. Embedding and retrieval operate on the resulting corpus.

pub mod chunker;
pub mod classifier;
pub mod embedder;
pub mod error;
pub mod extract;
pub mod graph;
pub mod host;
pub mod ingest;
pub mod languages;
pub mod record;
pub mod retriever;
pub mod store;

pub use error::{IndexError, IngestError, Result, StoreError};
pub use record::ContextRecord;
