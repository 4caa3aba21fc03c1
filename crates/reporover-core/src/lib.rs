//! Grounded learning artifacts over an ingested repository corpus.
//!
//! [`engine::GroundedEngine`] turns budgeted contexts into citation-checked
//! artifacts; [`tutor::Tutor`] wires ingestion, storage, caching and the
//! engine together.

pub mod artifacts;
pub mod ask;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod grading;
pub mod overlay;
pub mod replay;
pub mod tutor;
pub mod txlog;

pub use artifacts::{Artifact, ArtifactKind};
pub use error::{CacheError, GenerationError, TutorError, TxLogError};
pub use tutor::Tutor;
