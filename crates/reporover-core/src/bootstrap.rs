//! Wiring from configuration to a ready tutor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
#[cfg(not(feature = "mock"))]
use anyhow::bail;
use reporover_index::host::GitHubHost;
use reporover_index::store::JsonCorpusStore;
use reporover_llm::any::AnyProvider;
use reporover_llm::ollama::OllamaProvider;
use reporover_llm::openai::OpenAiProvider;

use crate::cache::FileArtifactCache;
use crate::config::{Config, ProviderKind};
use crate::tutor::Tutor;
use crate::txlog::JsonlTransactionLog;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

pub type AppTutor = Tutor<AnyProvider, JsonCorpusStore, JsonlTransactionLog, FileArtifactCache>;

/// Priority: explicit path > `REPOROVER_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_owned();
    }
    if let Ok(path) = std::env::var("REPOROVER_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// # Errors
///
/// Returns an error if the configured provider is unavailable in this build.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    let timeout = Duration::from_secs(llm.timeout);
    match llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(
            OllamaProvider::new(&llm.base_url, llm.model.clone(), llm.embedding_model.clone())
                .with_timeout(timeout),
        )),
        ProviderKind::OpenAi => {
            if config.secrets.openai_api_key.is_none() {
                tracing::warn!("REPOROVER_OPENAI_API_KEY not set, sending unauthenticated requests");
            }
            Ok(AnyProvider::OpenAi(
                OpenAiProvider::new(
                    config.secrets.openai_api_key.clone(),
                    llm.base_url.clone(),
                    llm.model.clone(),
                    llm.max_tokens,
                    Some(llm.embedding_model.clone()),
                )
                .with_timeout(timeout),
            ))
        }
        #[cfg(feature = "mock")]
        ProviderKind::Mock => Ok(AnyProvider::Mock(reporover_llm::mock::MockProvider::default())),
        #[cfg(not(feature = "mock"))]
        ProviderKind::Mock => bail!("the mock provider requires building with the `mock` feature"),
    }
}

#[must_use]
pub fn create_host(config: &Config) -> GitHubHost {
    GitHubHost::new(config.secrets.github_token.clone())
}

/// File-backed tutor rooted at `storage.data_dir`.
///
/// # Errors
///
/// Returns an error if the provider cannot be built or the data directory
/// cannot be created.
pub fn build_tutor(config: Config) -> anyhow::Result<AppTutor> {
    let provider = create_provider(&config)?;
    let storage = &config.storage;
    std::fs::create_dir_all(&storage.data_dir).with_context(|| {
        format!(
            "failed to create data directory {}",
            storage.data_dir.display()
        )
    })?;
    let store = JsonCorpusStore::new(storage.corpus_dir());
    let log = JsonlTransactionLog::new(storage.transactions_dir());
    let cache = FileArtifactCache::new(storage.cache_dir());
    tracing::debug!(
        provider = %config.llm.provider,
        data_dir = %storage.data_dir.display(),
        "tutor ready"
    );
    Ok(Tutor::new(provider, store, log, cache, config))
}
