use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use reporover_index::embedder::EmbeddingConfig;
pub use reporover_index::extract::ExtractConfig;
pub use reporover_index::ingest::IngestConfig;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chunking: ExtractConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Generation and embedding backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Mock,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request deadline, seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout: u64,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_model() -> String {
    "llama3.1:8b".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
            timeout: default_llm_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Contexts retrieved for an explanation.
    pub top_k: usize,
    /// Contexts retrieved for lesson planning before the priority filter.
    pub lesson_top_k: usize,
    /// Highest (least important) priority admitted into lessons.
    pub lesson_max_priority: u8,
    /// Contexts kept for lesson planning after filtering.
    pub lesson_contexts: usize,
    pub hint_contexts: usize,
    /// Contexts retrieved for free-text questions.
    pub ask_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            lesson_top_k: 12,
            lesson_max_priority: 3,
            lesson_contexts: 8,
            hint_contexts: 3,
            ask_top_k: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_attempts: u32,
    pub lesson_count: usize,
    pub quiz_questions: usize,
    /// Below this many contexts a lesson only gets a one-question practice quiz.
    pub min_quiz_contexts: usize,
    pub explanation_budget: usize,
    pub lesson_budget: usize,
    pub quiz_budget: usize,
    pub hint_budget: usize,
    pub ask_budget: usize,
    pub explanation_temperature: f32,
    pub lesson_temperature: f32,
    pub quiz_temperature: f32,
    pub hint_temperature: f32,
    pub ask_temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            lesson_count: 3,
            quiz_questions: 3,
            min_quiz_contexts: 2,
            explanation_budget: 8000,
            lesson_budget: 15_000,
            quiz_budget: 10_000,
            hint_budget: 4000,
            ask_budget: 8000,
            explanation_temperature: 0.1,
            lesson_temperature: 0.2,
            quiz_temperature: 0.2,
            hint_temperature: 0.25,
            ask_temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    pub max_files: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { max_files: 40 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub fn corpus_dir(&self) -> PathBuf {
        self.data_dir.join("corpus")
    }

    #[must_use]
    pub fn transactions_dir(&self) -> PathBuf {
        self.data_dir.join("transactions")
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }
}

/// Credentials read from the environment only; never serialized.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<String>,
    pub github_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("ResolvedSecrets")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("github_token", &redact(&self.github_token))
            .finish()
    }
}
