//! Batched embedding of context records with bounded retry.

use std::time::Duration;

use reporover_llm::LlmProvider;
use serde::{Deserialize, Serialize};

use crate::record::ContextRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub batch_size: usize,
    /// Extra attempts for a batch that failed with a transient error.
    pub max_retries: u32,
    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Outcome counters for one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingReport {
    pub embedded: usize,
    /// Records left with a null embedding.
    pub failed: usize,
    pub batches: usize,
    pub retries: usize,
}

pub struct EmbeddingIndexer<'a, P: LlmProvider> {
    provider: &'a P,
    config: EmbeddingConfig,
}

impl<'a, P: LlmProvider> EmbeddingIndexer<'a, P> {
    #[must_use]
    pub fn new(provider: &'a P, config: EmbeddingConfig) -> Self {
        Self { provider, config }
    }

    /// Attach an embedding to every record, batch by batch.
    ///
    /// Failures never drop records: a batch that cannot be embedded keeps
    /// `embedding = None` and is counted in `failed`.
    pub async fn index(&self, records: &mut [ContextRecord]) -> EmbeddingReport {
        let mut report = EmbeddingReport::default();
        if records.is_empty() {
            return report;
        }
        if !self.provider.supports_embeddings() {
            tracing::warn!(
                provider = self.provider.name(),
                records = records.len(),
                "provider has no embedding support, records stay unembedded"
            );
            for record in records.iter_mut() {
                record.embedding = None;
            }
            report.failed = records.len();
            return report;
        }

        for (batch_idx, batch) in records.chunks_mut(self.config.batch_size.max(1)).enumerate() {
            report.batches += 1;
            let texts: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();
            let mut attempt = 0;
            let vectors = loop {
                match self.provider.embed_batch(&texts).await {
                    Ok(vectors) if vectors.len() == texts.len() => break Some(vectors),
                    Ok(vectors) => {
                        tracing::warn!(
                            batch = batch_idx,
                            expected = texts.len(),
                            got = vectors.len(),
                            "embedding count mismatch"
                        );
                        break None;
                    }
                    Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                        attempt += 1;
                        report.retries += 1;
                        tracing::warn!(
                            batch = batch_idx,
                            attempt,
                            max_retries = self.config.max_retries,
                            "transient embedding failure, retrying: {e}"
                        );
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                    Err(e) => {
                        tracing::warn!(batch = batch_idx, attempts = attempt + 1, "embedding failed: {e}");
                        break None;
                    }
                }
            };

            match vectors {
                Some(vectors) => {
                    for (record, vector) in batch.iter_mut().zip(vectors) {
                        record.embedding = Some(vector);
                    }
                    report.embedded += batch.len();
                }
                None => {
                    for record in batch.iter_mut() {
                        record.embedding = None;
                    }
                    report.failed += batch.len();
                }
            }
        }

        tracing::info!(
            embedded = report.embedded,
            failed = report.failed,
            batches = report.batches,
            retries = report.retries,
            "embedding pass complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use reporover_llm::mock::MockProvider;

    use super::*;
    use crate::languages::Lang;
    use crate::record::{FileSource, RecordKind};

    fn records(n: usize) -> Vec<ContextRecord> {
        let source = FileSource {
            repo_id: "acme/widgets",
            path: "notes.txt",
            lang: Lang::Text,
            priority: 6,
        };
        (0..n)
            .map(|i| {
                ContextRecord::new(
                    &source,
                    source.record_id(&i.to_string()),
                    RecordKind::Window,
                    format!("chunk {i}"),
                )
            })
            .collect()
    }

    fn fast(batch_size: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            batch_size,
            max_retries: 3,
            retry_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn embeds_in_batches() {
        let mock = MockProvider::default();
        let mut recs = records(5);
        let report = EmbeddingIndexer::new(&mock, fast(2)).index(&mut recs).await;
        assert_eq!(report.batches, 3);
        assert_eq!(report.embedded, 5);
        assert_eq!(mock.embed_calls(), 3);
        assert!(recs.iter().all(|r| r.embedding.is_some()));
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let mock = MockProvider::default().with_embed_timeouts(2);
        let mut recs = records(3);
        let report = EmbeddingIndexer::new(&mock, fast(10)).index(&mut recs).await;
        assert_eq!(report.retries, 2);
        assert_eq!(report.embedded, 3);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn exhausted_retries_leave_null_embeddings() {
        let mock = MockProvider::default().with_embed_timeouts(10);
        let mut recs = records(3);
        let report = EmbeddingIndexer::new(&mock, fast(10)).index(&mut recs).await;
        assert_eq!(report.retries, 3);
        assert_eq!(report.failed, 3);
        assert_eq!(recs.len(), 3);
        assert!(recs.iter().all(|r| r.embedding.is_none()));
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let mock = MockProvider::failing();
        let mut recs = records(4);
        let report = EmbeddingIndexer::new(&mock, fast(2)).index(&mut recs).await;
        assert_eq!(report.retries, 0);
        assert_eq!(report.failed, 4);
        assert_eq!(mock.embed_calls(), 2);
    }

    #[tokio::test]
    async fn provider_without_embeddings_marks_all_failed() {
        let mock = MockProvider::default().without_embeddings();
        let mut recs = records(2);
        let report = EmbeddingIndexer::new(&mock, fast(10)).index(&mut recs).await;
        assert_eq!(report.failed, 2);
        assert_eq!(mock.embed_calls(), 0);
    }

    #[test]
    fn config_parses_delay_in_seconds() {
        let cfg: EmbeddingConfig = serde_json::from_str(r#"{"retry_delay": 0.5}"#).unwrap();
        assert_eq!(cfg.retry_delay, Duration::from_millis(500));
        assert_eq!(cfg.batch_size, 100);
    }
}
