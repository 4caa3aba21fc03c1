//! Free-text questions answered from retrieved context, streamed.
//!
//! This path has no JSON contract and no citation check; it is a reading aid.

use reporover_index::ContextRecord;
use reporover_index::retriever::Retriever;
use reporover_llm::provider::ChatStream;
use reporover_llm::{LlmError, LlmProvider, Message};
use tokio_stream::StreamExt;

use crate::config::{GenerationConfig, RetrievalConfig};
use crate::engine::{PromptBudget, priority_fallback};
use crate::error::{GenerationError, TutorError};

const ASK_SYSTEM: &str = "You answer questions about a code repository using only the \
excerpts provided. Mention the CONTEXT_ID of each excerpt you rely on. If the excerpts \
do not answer the question, say so.";

pub struct AskAnswer {
    pub context_ids: Vec<String>,
    pub stream: ChatStream,
}

impl std::fmt::Debug for AskAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AskAnswer")
            .field("context_ids", &self.context_ids)
            .finish_non_exhaustive()
    }
}

impl AskAnswer {
    /// Drain the stream into one string.
    ///
    /// # Errors
    ///
    /// Returns the first chunk error.
    pub async fn collect(mut self) -> Result<String, LlmError> {
        let mut out = String::new();
        while let Some(chunk) = self.stream.next().await {
            out.push_str(&chunk?);
        }
        Ok(out)
    }
}

#[must_use]
pub fn ask_prompt(question: &str, contexts: &str) -> String {
    format!("CONTEXTS:\n{contexts}\n\nQUESTION: {question}")
}

/// Retrieve, budget and start streaming an answer.
///
/// # Errors
///
/// Fails when no context can be sent or the backend refuses the stream.
pub async fn ask<P: LlmProvider>(
    provider: &P,
    question: &str,
    corpus: &[ContextRecord],
    retrieval: &RetrievalConfig,
    generation: &GenerationConfig,
) -> Result<AskAnswer, TutorError> {
    let hits = Retriever::new(provider)
        .retrieve(question, corpus, retrieval.ask_top_k)
        .await;
    let selected: Vec<&ContextRecord> = if hits.is_empty() {
        priority_fallback(corpus, retrieval.ask_top_k)
    } else {
        hits.into_iter().map(|h| h.record).collect()
    };

    let mut budget = PromptBudget::new(generation.ask_budget);
    budget.fill(selected);
    if budget.is_empty() {
        return Err(GenerationError::InsufficientContext(format!(
            "nothing to answer '{question}' from"
        ))
        .into());
    }

    let messages = [
        Message::system(ASK_SYSTEM),
        Message::user(ask_prompt(question, budget.render())),
    ];
    let stream = provider
        .chat_stream(&messages, generation.ask_temperature)
        .await?;
    tracing::info!(contexts = budget.included().len(), "streaming answer");
    Ok(AskAnswer {
        context_ids: budget.included().to_vec(),
        stream,
    })
}
