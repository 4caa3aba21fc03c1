//! Explicit artifact cache keyed by request identity and corpus content.
//!
//! Nothing is memoised implicitly: callers look up, store and invalidate
//! through an [`ArtifactCache`] they own.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use reporover_index::ContextRecord;
use serde::{Deserialize, Serialize};

use crate::artifacts::{Artifact, ArtifactKind};
use crate::error::CacheError;

/// Content hash of one generation request over one candidate set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub repo_id: String,
    pub digest: String,
}

impl CacheKey {
    /// Any change to a candidate's content changes the key.
    #[must_use]
    pub fn new(
        kind: ArtifactKind,
        repo_id: &str,
        target: &str,
        goal: &str,
        candidates: &[ContextRecord],
    ) -> Self {
        let mut pairs: Vec<(&str, &str)> = candidates
            .iter()
            .map(|r| (r.id.as_str(), r.checksum.as_str()))
            .collect();
        pairs.sort_unstable();
        let mut hasher = blake3::Hasher::new();
        for part in [kind.as_str(), repo_id, target, goal] {
            hasher.update(part.as_bytes());
            hasher.update(&[0]);
        }
        for (id, checksum) in pairs {
            hasher.update(id.as_bytes());
            hasher.update(&[1]);
            hasher.update(checksum.as_bytes());
            hasher.update(&[0]);
        }
        Self {
            repo_id: repo_id.to_owned(),
            digest: hasher.finalize().to_hex().to_string(),
        }
    }
}

pub trait ArtifactCache: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if a stored entry exists but cannot be read.
    fn get(&self, key: &CacheKey) -> impl Future<Output = Result<Option<Artifact>, CacheError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    fn put(&self, key: &CacheKey, artifact: &Artifact) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Remove one entry. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exists but cannot be removed.
    fn invalidate(&self, key: &CacheKey) -> impl Future<Output = Result<bool, CacheError>> + Send;

    /// Remove every entry of one repository, returning how many were dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the entries cannot be removed.
    fn invalidate_repo(&self, repo_id: &str) -> impl Future<Output = Result<usize, CacheError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the entries cannot be removed.
    fn clear(&self) -> impl Future<Output = Result<usize, CacheError>> + Send;
}

#[derive(Debug, Default)]
pub struct MemoryArtifactCache {
    entries: Mutex<HashMap<CacheKey, Artifact>>,
}

impl MemoryArtifactCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A panicking writer cannot leave the map half-updated, so poisoning is
    /// recovered from.
    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Artifact>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactCache for MemoryArtifactCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Artifact>, CacheError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn put(&self, key: &CacheKey, artifact: &Artifact) -> Result<(), CacheError> {
        self.entries().insert(key.clone(), artifact.clone());
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.entries().remove(key).is_some())
    }

    async fn invalidate_repo(&self, repo_id: &str) -> Result<usize, CacheError> {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|k, _| k.repo_id != repo_id);
        Ok(before - entries.len())
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries();
        let n = entries.len();
        entries.clear();
        Ok(n)
    }
}

/// One JSON file per entry under `<dir>/<owner__repo>/<digest>.json`.
#[derive(Debug, Clone)]
pub struct FileArtifactCache {
    dir: PathBuf,
}

impl FileArtifactCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn repo_dir(&self, repo_id: &str) -> PathBuf {
        self.dir.join(repo_id.replace('/', "__"))
    }

    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.repo_dir(&key.repo_id).join(format!("{}.json", key.digest))
    }
}

/// Remove the `.json` entries directly inside `dir`.
async fn remove_entries(dir: &Path) -> Result<usize, CacheError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            tokio::fs::remove_file(&path).await?;
            removed += 1;
        }
    }
    tokio::fs::remove_dir(dir).await.ok();
    Ok(removed)
}

impl ArtifactCache for FileArtifactCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Artifact>, CacheError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &CacheKey, artifact: &Artifact) -> Result<(), CacheError> {
        let path = self.path_for(key);
        tokio::fs::create_dir_all(self.repo_dir(&key.repo_id)).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(artifact)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(path = %path.display(), kind = %artifact.kind(), "cached artifact");
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn invalidate_repo(&self, repo_id: &str) -> Result<usize, CacheError> {
        remove_entries(&self.repo_dir(repo_id)).await
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let mut repos = match tokio::fs::read_dir(&self.dir).await {
            Ok(repos) => repos,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        while let Some(entry) = repos.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                removed += remove_entries(&entry.path()).await?;
            }
        }
        tracing::info!(removed, dir = %self.dir.display(), "cleared artifact cache");
        Ok(removed)
    }
}
