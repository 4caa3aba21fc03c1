//! Corpus persistence keyed by repository id.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::StoreError;
use crate::record::ContextRecord;

pub trait CorpusStore: Send + Sync {
    /// Records previously saved for `repo_id`, or `None` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error when stored data exists but cannot be read.
    fn load(
        &self,
        repo_id: &str,
    ) -> impl Future<Output = Result<Option<Vec<ContextRecord>>, StoreError>> + Send;

    /// Replace the corpus for `repo_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the corpus cannot be written.
    fn save(
        &self,
        repo_id: &str,
        records: &[ContextRecord],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// One JSON file per repository: `<dir>/<owner>__<repo>.json`.
#[derive(Debug, Clone)]
pub struct JsonCorpusStore {
    dir: PathBuf,
}

impl JsonCorpusStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path_for(&self, repo_id: &str) -> PathBuf {
        let stem: String = repo_id
            .replace('/', "__")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || "._-".contains(c) { c } else { '_' })
            .collect();
        self.dir.join(format!("{stem}.json"))
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl CorpusStore for JsonCorpusStore {
    async fn load(&self, repo_id: &str) -> Result<Option<Vec<ContextRecord>>, StoreError> {
        let path = self.path_for(repo_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path)(e)),
        };
        let records = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(records))
    }

    async fn save(&self, repo_id: &str, records: &[ContextRecord]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_err(&self.dir))?;
        let path = self.path_for(repo_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&tmp, bytes).await.map_err(io_err(&tmp))?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err(&path))?;
        tracing::debug!(repo_id, records = records.len(), path = %path.display(), "corpus saved");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCorpusStore {
    corpora: RwLock<HashMap<String, Vec<ContextRecord>>>,
}

impl MemoryCorpusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CorpusStore for MemoryCorpusStore {
    async fn load(&self, repo_id: &str) -> Result<Option<Vec<ContextRecord>>, StoreError> {
        Ok(self
            .corpora
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(repo_id)
            .cloned())
    }

    async fn save(&self, repo_id: &str, records: &[ContextRecord]) -> Result<(), StoreError> {
        self.corpora
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(repo_id.to_owned(), records.to_vec());
        Ok(())
    }
}
