//! Append-only record of every generation attempt.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::artifacts::ArtifactKind;
use crate::error::TxLogError;

/// One model call made on behalf of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub timestamp: DateTime<Utc>,
    pub transaction_id: String,
    pub kind: ArtifactKind,
    pub repo_id: String,
    pub target: String,
    pub attempt: u32,
    pub context_ids: Vec<String>,
    pub prompt_chars: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    /// Final artifact, present only on the successful attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<serde_json::Value>,
}

impl AttemptRecord {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.artifact.is_some()
    }
}

pub trait TransactionLog: Send + Sync {
    /// Persist one attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn append(&self, record: &AttemptRecord) -> impl Future<Output = Result<(), TxLogError>> + Send;
}

/// Writes `<dir>/<transaction_id>.jsonl`, one line per attempt.
#[derive(Debug, Clone)]
pub struct JsonlTransactionLog {
    dir: PathBuf,
}

impl JsonlTransactionLog {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path_for(&self, transaction_id: &str) -> PathBuf {
        self.dir.join(format!("{transaction_id}.jsonl"))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TransactionLog for JsonlTransactionLog {
    async fn append(&self, record: &AttemptRecord) -> Result<(), TxLogError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(&record.transaction_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTransactionLog {
    records: Mutex<Vec<AttemptRecord>>,
}

impl MemoryTransactionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TransactionLog for MemoryTransactionLog {
    async fn append(&self, record: &AttemptRecord) -> Result<(), TxLogError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

/// Read every attempt of one transaction file, oldest first.
///
/// # Errors
///
/// Returns an error if the file is missing, a line is not a valid record, or
/// the file holds no records.
pub async fn read_attempts(path: &Path) -> Result<Vec<AttemptRecord>, TxLogError> {
    let text = tokio::fs::read_to_string(path).await?;
    let attempts = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect::<Result<Vec<AttemptRecord>, _>>()?;
    if attempts.is_empty() {
        return Err(TxLogError::Empty {
            path: path.display().to_string(),
        });
    }
    Ok(attempts)
}

#[cfg(test)]
pub(crate) fn sample_attempt(transaction_id: &str, attempt: u32) -> AttemptRecord {
    AttemptRecord {
        timestamp: Utc::now(),
        transaction_id: transaction_id.into(),
        kind: ArtifactKind::Explanation,
        repo_id: "acme/widgets".into(),
        target: "start".into(),
        attempt,
        context_ids: vec!["acme/widgets:src/app.py:start:1".into()],
        prompt_chars: 120,
        raw_response: Some("not json".into()),
        errors: vec!["response is not a single JSON object".into()],
        artifact: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jsonl_appends_one_line_per_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlTransactionLog::new(dir.path().join("tx"));
        log.append(&sample_attempt("abc", 1)).await.unwrap();
        let mut second = sample_attempt("abc", 2);
        second.artifact = Some(serde_json::json!({"summary": "ok"}));
        log.append(&second).await.unwrap();

        let text = std::fs::read_to_string(log.path_for("abc")).unwrap();
        assert_eq!(text.lines().count(), 2);

        let attempts = read_attempts(&log.path_for("abc")).await.unwrap();
        assert_eq!(attempts[0].attempt, 1);
        assert!(!attempts[0].succeeded());
        assert!(attempts[1].succeeded());
    }

    #[tokio::test]
    async fn empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        std::fs::write(&path, "\n").unwrap();
        assert!(matches!(
            read_attempts(&path).await,
            Err(TxLogError::Empty { .. })
        ));
    }

    #[tokio::test]
    async fn memory_log_records_after_a_poisoned_lock() {
        let log = MemoryTransactionLog::new();
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = log.records.lock().unwrap();
            panic!("writer died");
        }));
        assert!(panicked.is_err());

        log.append(&sample_attempt("t", 1)).await.unwrap();
        assert_eq!(log.records().len(), 1);
    }

    #[tokio::test]
    async fn memory_log_keeps_order() {
        let log = MemoryTransactionLog::new();
        log.append(&sample_attempt("t", 1)).await.unwrap();
        log.append(&sample_attempt("t", 2)).await.unwrap();
        let attempts: Vec<u32> = log.records().iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, [1, 2]);
    }
}
