//! Offline inspection and re-validation of recorded transactions.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use reporover_index::ContextRecord;
use reporover_llm::provider::ChatStream;
use reporover_llm::{LlmError, LlmProvider, Message};
use serde::Serialize;

use crate::artifacts::ArtifactKind;
use crate::error::TxLogError;
use crate::txlog::{AttemptRecord, read_attempts};

#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub transaction_id: String,
    pub kind: ArtifactKind,
    pub repo_id: String,
    pub target: String,
    pub attempts: usize,
    /// Context ids of the last attempt.
    pub context_ids: Vec<String>,
    pub artifact: Option<serde_json::Value>,
    pub last_raw: Option<String>,
    pub errors: Vec<String>,
}

impl ReplaySummary {
    #[must_use]
    pub fn from_attempts(attempts: &[AttemptRecord]) -> Option<Self> {
        let last = attempts.last()?;
        Some(Self {
            transaction_id: last.transaction_id.clone(),
            kind: last.kind,
            repo_id: last.repo_id.clone(),
            target: last.target.clone(),
            attempts: attempts.len(),
            context_ids: last.context_ids.clone(),
            artifact: attempts.iter().rev().find_map(|a| a.artifact.clone()),
            last_raw: attempts.iter().rev().find_map(|a| a.raw_response.clone()),
            errors: attempts.iter().flat_map(|a| a.errors.iter().cloned()).collect(),
        })
    }

    /// The recorded contexts, in prompt order, looked up in `corpus`.
    #[must_use]
    pub fn contexts(&self, corpus: &[ContextRecord]) -> Vec<ContextRecord> {
        self.context_ids
            .iter()
            .filter_map(|id| corpus.iter().find(|r| &r.id == id).cloned())
            .collect()
    }
}

/// Summarise one `<transaction_id>.jsonl` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds no attempts.
pub async fn replay(path: &Path) -> Result<ReplaySummary, TxLogError> {
    let attempts = read_attempts(path).await?;
    ReplaySummary::from_attempts(&attempts).ok_or_else(|| TxLogError::Empty {
        path: path.display().to_string(),
    })
}

/// Serves recorded raw responses in order, so validation can be re-run
/// without a live model.
#[derive(Debug, Default)]
pub struct ReplayProvider {
    responses: Mutex<VecDeque<String>>,
}

impl ReplayProvider {
    #[must_use]
    pub fn from_attempts(attempts: &[AttemptRecord]) -> Self {
        Self {
            responses: Mutex::new(
                attempts
                    .iter()
                    .filter_map(|a| a.raw_response.clone())
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl LlmProvider for ReplayProvider {
    async fn chat(&self, _messages: &[Message], _temperature: f32) -> Result<String, LlmError> {
        self.responses
            .lock()
            .map_err(|_| LlmError::Other("replay queue poisoned".into()))?
            .pop_front()
            .ok_or_else(|| LlmError::Other("no recorded responses left".into()))
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        temperature: f32,
    ) -> Result<ChatStream, LlmError> {
        let response = self.chat(messages, temperature).await?;
        Ok(Box::pin(tokio_stream::once(Ok(response))))
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Err(LlmError::EmbedUnsupported { provider: "replay" })
    }

    fn supports_embeddings(&self) -> bool {
        false
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use reporover_llm::mock::MockProvider;

    use super::*;
    use crate::artifacts::ExplanationPlugin;
    use crate::artifacts::fixtures::{code, doc};
    use crate::config::GenerationConfig;
    use crate::engine::{GenerationRequest, GroundedEngine, RetryPolicy, Selection};
    use crate::txlog::{JsonlTransactionLog, MemoryTransactionLog};

    fn explanation() -> String {
        serde_json::json!({
            "summary": "Starts the server.",
            "key_points": ["a", "b", "c"],
            "unit_test": {"title": "t", "code": "assert start() is None"},
            "sources": ["acme/widgets:src/app.py:start:1"]
        })
        .to_string()
    }

    #[tokio::test]
    async fn replay_reproduces_the_artifact() {
        let corpus = vec![
            code("acme/widgets:src/app.py:start:1", "src/app.py", "def start(): ..."),
            doc("acme/widgets:README.md:section:0", "README.md", "# Widgets"),
        ];
        let request = GenerationRequest {
            repo_id: "acme/widgets".into(),
            target: "start".into(),
            goal: String::new(),
            selection: Selection::Preselected,
        };
        let plugin = ExplanationPlugin::new("src/app.py", &GenerationConfig::default());

        let dir = tempfile::tempdir().unwrap();
        let log = JsonlTransactionLog::new(dir.path());
        let live = MockProvider::with_responses(vec!["oops".into(), explanation()]);
        let first = GroundedEngine::new(&live, &log, RetryPolicy::default())
            .generate(&plugin, &request, &corpus)
            .await
            .unwrap();

        let path = log.path_for(&first.transaction_id);
        let summary = replay(&path).await.unwrap();
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.kind, ArtifactKind::Explanation);
        assert_eq!(summary.context_ids, first.context_ids);
        assert!(summary.artifact.is_some());
        assert_eq!(summary.errors, ["response is not a single JSON object"]);

        let attempts = read_attempts(&path).await.unwrap();
        let provider = ReplayProvider::from_attempts(&attempts);
        let contexts = summary.contexts(&corpus);
        let scratch = MemoryTransactionLog::new();
        let again = GroundedEngine::new(&provider, &scratch, RetryPolicy::default())
            .generate(&plugin, &request, &contexts)
            .await
            .unwrap();
        assert_eq!(again.artifact, first.artifact);
        assert_eq!(again.transaction_id, first.transaction_id);
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn exhausted_replay_is_a_model_error() {
        let provider = ReplayProvider::default();
        assert!(provider.chat(&[Message::user("q")], 0.0).await.is_err());
        assert!(!provider.supports_embeddings());
    }
}
