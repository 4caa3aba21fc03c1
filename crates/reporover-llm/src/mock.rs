//! Test-only mock provider with scripted responses and keyword embeddings.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    /// Returned when no keyword rule matches the text.
    pub embedding: Vec<f32>,
    /// `(keyword, vector)` pairs summed for every keyword the lowercased text contains.
    pub embedding_rules: Vec<(String, Vec<f32>)>,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    pub fail_embed: bool,
    embed_timeouts: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding: vec![0.0; 8],
            embedding_rules: Vec::new(),
            supports_embeddings: true,
            fail_chat: false,
            fail_embed: false,
            embed_timeouts: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embedding_rule(mut self, keyword: &str, vector: Vec<f32>) -> Self {
        self.embedding_rules.push((keyword.to_lowercase(), vector));
        self
    }

    /// Fail the next `n` embedding calls with `LlmError::Timeout`.
    #[must_use]
    pub fn with_embed_timeouts(self, n: usize) -> Self {
        self.embed_timeouts.store(n, Ordering::SeqCst);
        self
    }

    #[must_use]
    pub fn without_embeddings(mut self) -> Self {
        self.supports_embeddings = false;
        self
    }

    /// Prompts received by `chat`, one entry per call (user messages joined).
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut acc: Option<Vec<f32>> = None;
        for (keyword, vector) in &self.embedding_rules {
            if !lower.contains(keyword.as_str()) {
                continue;
            }
            match acc.as_mut() {
                Some(sum) => {
                    for (s, v) in sum.iter_mut().zip(vector) {
                        *s += v;
                    }
                }
                None => acc = Some(vector.clone()),
            }
        }
        acc.unwrap_or_else(|| self.embedding.clone())
    }

    fn check_embed(&self) -> Result<(), LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if !self.supports_embeddings {
            return Err(LlmError::EmbedUnsupported { provider: "mock" });
        }
        if self
            .embed_timeouts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LlmError::Timeout { provider: "mock" });
        }
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        Ok(())
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message], _temperature: f32) -> Result<String, LlmError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt);
        }
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self
            .responses
            .lock()
            .map_err(|_| LlmError::Other("mock response queue poisoned".into()))?;
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        temperature: f32,
    ) -> Result<ChatStream, LlmError> {
        let response = self.chat(messages, temperature).await?;
        let chunks: Vec<Result<String, LlmError>> = response
            .split_inclusive(' ')
            .map(|c| Ok(c.to_owned()))
            .collect();
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.check_embed()?;
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.check_embed()?;
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
