use std::str::FromStr;

use super::{Config, ProviderKind};

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring invalid {key} value: {raw}");
            None
        }
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_pipeline();
        self.apply_env_secrets();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("REPOROVER_LLM_PROVIDER") {
            if let Ok(kind) =
                serde_json::from_value::<ProviderKind>(serde_json::Value::String(v.to_lowercase()))
            {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid REPOROVER_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("REPOROVER_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOROVER_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REPOROVER_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Some(n) = parse_env("REPOROVER_LLM_MAX_TOKENS") {
            self.llm.max_tokens = n;
        }
        if let Some(secs) = parse_env("REPOROVER_LLM_TIMEOUT") {
            self.llm.timeout = secs;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Some(n) = parse_env("REPOROVER_INGEST_MAX_FILES") {
            self.ingest.max_files = n;
        }
        if let Some(n) = parse_env("REPOROVER_INGEST_MAX_FILE_BYTES") {
            self.ingest.max_file_bytes = n;
        }
        if let Some(n) = parse_env("REPOROVER_EMBEDDING_BATCH_SIZE") {
            self.embedding.batch_size = n;
        }
        if let Some(n) = parse_env("REPOROVER_EMBEDDING_MAX_RETRIES") {
            self.embedding.max_retries = n;
        }
        if let Some(k) = parse_env("REPOROVER_RETRIEVAL_TOP_K") {
            self.retrieval.top_k = k;
        }
        if let Some(n) = parse_env("REPOROVER_GENERATION_MAX_ATTEMPTS") {
            self.generation.max_attempts = n;
        }
        if let Some(n) = parse_env("REPOROVER_GENERATION_QUIZ_QUESTIONS") {
            self.generation.quiz_questions = n;
        }
        if let Some(n) = parse_env("REPOROVER_GRAPH_MAX_FILES") {
            self.graph.max_files = n;
        }
        if let Ok(v) = std::env::var("REPOROVER_DATA_DIR") {
            self.storage.data_dir = v.into();
        }
    }

    fn apply_env_secrets(&mut self) {
        if let Ok(v) = std::env::var("REPOROVER_OPENAI_API_KEY")
            && !v.is_empty()
        {
            self.secrets.openai_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("REPOROVER_GITHUB_TOKEN")
            && !v.is_empty()
        {
            self.secrets.github_token = Some(v);
        }
    }
}
