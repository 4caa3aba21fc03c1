//! Cosine-similarity retrieval over an in-memory candidate set.

use std::cmp::Ordering;

use reporover_llm::LlmProvider;
use serde::Serialize;

use crate::record::ContextRecord;

const NORM_EPSILON: f32 = 1e-12;

/// A candidate paired with its similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredContext<'a> {
    pub record: &'a ContextRecord,
    pub score: f32,
}

/// `dot / (|a|·|b| + ε)`; zero for empty or mismatched vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    dot / (na.sqrt() * nb.sqrt() + NORM_EPSILON)
}

/// Score and order candidates against an already-embedded query.
///
/// Records without an embedding are skipped. Ties are broken by id ascending so
/// the order is stable across runs.
#[must_use]
pub fn rank<'a>(query: &[f32], candidates: &'a [ContextRecord], k: usize) -> Vec<ScoredContext<'a>> {
    let mut scored: Vec<ScoredContext<'a>> = candidates
        .iter()
        .filter_map(|record| {
            record.embedding.as_deref().map(|e| ScoredContext {
                record,
                score: cosine_similarity(query, e),
            })
        })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    scored.truncate(k);
    scored
}

pub struct Retriever<'a, P: LlmProvider> {
    provider: &'a P,
}

impl<'a, P: LlmProvider> Retriever<'a, P> {
    #[must_use]
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Embed `query` once and return the top `k` candidates.
    ///
    /// An embedding failure is not an error here: it yields an empty result so
    /// callers fall back to priority-ordered selection.
    pub async fn retrieve<'c>(
        &self,
        query: &str,
        candidates: &'c [ContextRecord],
        k: usize,
    ) -> Vec<ScoredContext<'c>> {
        if k == 0 || candidates.is_empty() {
            return Vec::new();
        }
        let query_vector = match self.provider.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), "query embedding failed: {e}");
                return Vec::new();
            }
        };
        let hits = rank(&query_vector, candidates, k);
        tracing::debug!(k, hits = hits.len(), candidates = candidates.len(), "retrieved");
        hits
    }
}

#[cfg(test)]
mod tests {
    use reporover_llm::mock::MockProvider;

    use super::*;
    use crate::languages::Lang;
    use crate::record::{FileSource, RecordKind};

    fn record(id: &str, embedding: Option<Vec<f32>>) -> ContextRecord {
        let source = FileSource {
            repo_id: "acme/widgets",
            path: "src/app.py",
            lang: Lang::Python,
            priority: 3,
        };
        let mut r = ContextRecord::new(&source, id.into(), RecordKind::Function, id.into());
        r.embedding = embedding;
        r
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_does_not_divide_by_zero() {
        let s = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]);
        assert!(s.is_finite());
        assert!(s.abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn rank_orders_by_score_then_id() {
        let candidates = vec![
            record("b", Some(vec![1.0, 0.0])),
            record("a", Some(vec![1.0, 0.0])),
            record("c", Some(vec![0.0, 1.0])),
            record("d", None),
        ];
        let hits = rank(&[1.0, 0.0], &candidates, 10);
        let ids: Vec<_> = hits.iter().map(|h| h.record.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn rank_truncates_to_k() {
        let candidates = vec![
            record("a", Some(vec![1.0, 0.0])),
            record("b", Some(vec![0.5, 0.5])),
            record("c", Some(vec![0.0, 1.0])),
        ];
        assert_eq!(rank(&[1.0, 0.0], &candidates, 2).len(), 2);
    }

    #[tokio::test]
    async fn retrieve_prefers_matching_topic() {
        let mock = MockProvider::default()
            .with_embedding_rule("setup", vec![1.0, 0.0])
            .with_embedding_rule("usage", vec![0.0, 1.0]);
        let candidates = vec![
            record("usage", Some(vec![0.0, 1.0])),
            record("setup", Some(vec![1.0, 0.0])),
        ];
        let hits = Retriever::new(&mock).retrieve("setup", &candidates, 1).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "setup");
    }

    #[tokio::test]
    async fn embed_failure_returns_empty() {
        let mock = MockProvider::failing();
        let candidates = vec![record("a", Some(vec![1.0]))];
        assert!(Retriever::new(&mock).retrieve("q", &candidates, 3).await.is_empty());
    }

    #[tokio::test]
    async fn records_without_embeddings_are_never_returned() {
        let mock = MockProvider::default();
        let candidates = vec![record("a", None)];
        assert!(Retriever::new(&mock).retrieve("q", &candidates, 3).await.is_empty());
    }
}
