//! Generation and embedding backends behind one provider trait.

pub mod any;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod retry;
mod sse;

pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
