//! Grounded generation: budgeted contexts in, citation-checked artifact out.
//!
//! One engine drives every artifact type. Plugins supply the prompt, the
//! strict JSON contract and the citation fields; the engine owns selection,
//! budgeting, retries, confidence and the transaction log.

pub mod budget;
pub mod citation;
pub mod confidence;
pub mod parse;
pub mod retry;

use chrono::Utc;
use reporover_index::ContextRecord;
use reporover_index::retriever::Retriever;
use reporover_llm::{LlmProvider, Message};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use budget::PromptBudget;
pub use citation::CitationCheck;
pub use confidence::Confidence;
pub use retry::RetryPolicy;

use crate::artifacts::ArtifactKind;
use crate::error::GenerationError;
use crate::txlog::{AttemptRecord, TransactionLog};

/// How the engine picks contexts from the candidate set.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Use the candidates as given, in order.
    Preselected,
    /// Embed `query` and keep the `top_k` most similar candidates.
    Retrieve { query: String, top_k: usize },
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub repo_id: String,
    pub target: String,
    pub goal: String,
    pub selection: Selection,
}

/// Everything a plugin needs to assemble its final artifact.
#[derive(Debug)]
pub struct FinalizeContext<'a> {
    pub request: &'a GenerationRequest,
    /// Distinct validated ids in first-cited order.
    pub valid_ids: Vec<String>,
    pub warnings: Vec<String>,
    pub confidence: Confidence,
    /// The records whose blocks were sent to the model.
    pub contexts: &'a [&'a ContextRecord],
}

impl FinalizeContext<'_> {
    /// Resolve ids against the sent contexts, embeddings stripped.
    #[must_use]
    pub fn resolve(&self, ids: &[String]) -> Vec<ContextRecord> {
        ids.iter()
            .filter_map(|id| self.contexts.iter().find(|r| &r.id == id))
            .map(|r| r.without_embedding())
            .collect()
    }
}

/// One artifact type: prompt, strict contract and citation fields.
pub trait ArtifactPlugin: Send + Sync {
    /// Shape the model must return.
    type Raw: DeserializeOwned + Send;
    type Output: Serialize + Send;

    fn kind(&self) -> ArtifactKind;

    fn temperature(&self) -> f32;

    /// Maximum chars of context blocks in the prompt.
    fn char_budget(&self) -> usize;

    fn system_prompt(&self) -> String;

    fn render_prompt(&self, request: &GenerationRequest, contexts: &str) -> String;

    /// Structural checks beyond what deserialization enforces.
    ///
    /// # Errors
    ///
    /// Returns every violation found; any violation consumes an attempt.
    fn check_contract(&self, raw: &Self::Raw) -> Result<(), Vec<String>>;

    /// Run every cited-id field of `raw` through `check`.
    fn validate_citations(&self, raw: &mut Self::Raw, check: &mut CitationCheck<'_>);

    fn finalize(&self, raw: Self::Raw, ctx: FinalizeContext<'_>) -> Self::Output;
}

#[derive(Debug, Clone, Serialize)]
pub struct Generated<O> {
    pub artifact: O,
    pub transaction_id: String,
    pub attempts: u32,
    pub context_ids: Vec<String>,
}

/// Deterministic id of one generation request over one context set.
#[must_use]
pub fn transaction_id(kind: ArtifactKind, request: &GenerationRequest, included: &[String]) -> String {
    let mut ids: Vec<&str> = included.iter().map(String::as_str).collect();
    ids.sort_unstable();
    let mut hasher = blake3::Hasher::new();
    for part in [
        kind.as_str(),
        request.repo_id.as_str(),
        request.target.as_str(),
        request.goal.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex()[..32].to_owned()
}

/// Candidates ordered by (priority, start line, id), at least one.
#[must_use]
pub fn priority_fallback(candidates: &[ContextRecord], top_k: usize) -> Vec<&ContextRecord> {
    let mut ordered: Vec<&ContextRecord> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        (a.priority, a.start_line.unwrap_or(0), &a.id).cmp(&(
            b.priority,
            b.start_line.unwrap_or(0),
            &b.id,
        ))
    });
    ordered.truncate((top_k / 2).max(1));
    ordered
}

pub struct GroundedEngine<'a, P: LlmProvider, L: TransactionLog> {
    provider: &'a P,
    log: &'a L,
    policy: RetryPolicy,
}

impl<'a, P: LlmProvider, L: TransactionLog> GroundedEngine<'a, P, L> {
    #[must_use]
    pub fn new(provider: &'a P, log: &'a L, policy: RetryPolicy) -> Self {
        Self {
            provider,
            log,
            policy,
        }
    }

    async fn select<'c>(
        &self,
        selection: &Selection,
        candidates: &'c [ContextRecord],
    ) -> Vec<&'c ContextRecord> {
        match selection {
            Selection::Preselected => candidates.iter().collect(),
            Selection::Retrieve { query, top_k } => {
                let hits = Retriever::new(self.provider)
                    .retrieve(query, candidates, *top_k)
                    .await;
                if hits.is_empty() {
                    tracing::info!(%query, "retrieval empty, using priority fallback");
                    priority_fallback(candidates, *top_k)
                } else {
                    hits.into_iter().map(|h| h.record).collect()
                }
            }
        }
    }

    /// Run one grounded generation.
    ///
    /// # Errors
    ///
    /// `InsufficientContext` when nothing citable can be sent, `Failed` once
    /// every attempt has been consumed.
    pub async fn generate<A: ArtifactPlugin>(
        &self,
        plugin: &A,
        request: &GenerationRequest,
        candidates: &[ContextRecord],
    ) -> Result<Generated<A::Output>, GenerationError> {
        let kind = plugin.kind();
        if candidates.is_empty() {
            return Err(GenerationError::InsufficientContext(format!(
                "no candidate contexts for {kind} of {}",
                request.target
            )));
        }

        let selected = self.select(&request.selection, candidates).await;
        let mut budget = PromptBudget::new(plugin.char_budget());
        budget.fill(selected.iter().copied());
        if budget.is_empty() {
            return Err(GenerationError::InsufficientContext(format!(
                "no context block fits within {} chars",
                plugin.char_budget()
            )));
        }
        let sent = &selected[..budget.included().len()];
        let included = budget.included().to_vec();
        let tx_id = transaction_id(kind, request, &included);

        let system = plugin.system_prompt();
        let base_prompt = plugin.render_prompt(request, budget.render());
        let mut errors = Vec::new();
        let mut last_raw = None;

        for attempt in 1..=self.policy.max_attempts {
            let prompt = if attempt > 1 {
                (self.policy.augment)(&base_prompt)
            } else {
                base_prompt.clone()
            };
            tracing::debug!(
                %kind,
                transaction = %tx_id,
                attempt,
                contexts = included.len(),
                prompt_chars = prompt.chars().count(),
                "calling model"
            );
            let mut entry = AttemptRecord {
                timestamp: Utc::now(),
                transaction_id: tx_id.clone(),
                kind,
                repo_id: request.repo_id.clone(),
                target: request.target.clone(),
                attempt,
                context_ids: included.clone(),
                prompt_chars: prompt.chars().count(),
                raw_response: None,
                errors: Vec::new(),
                artifact: None,
            };

            let messages = [Message::system(system.clone()), Message::user(prompt)];
            match self.provider.chat(&messages, plugin.temperature()).await {
                Ok(raw) => {
                    entry.raw_response = Some(raw.clone());
                    match Self::accept(plugin, request, &raw, &included, sent) {
                        Ok(output) => {
                            entry.artifact = serde_json::to_value(&output).ok();
                            self.record(&entry).await;
                            tracing::info!(%kind, transaction = %tx_id, attempt, "artifact accepted");
                            return Ok(Generated {
                                artifact: output,
                                transaction_id: tx_id,
                                attempts: attempt,
                                context_ids: included,
                            });
                        }
                        Err(violations) => entry.errors = violations,
                    }
                    last_raw = Some(raw);
                }
                Err(e) => entry.errors.push(format!("model error: {e}")),
            }
            tracing::warn!(
                %kind,
                transaction = %tx_id,
                attempt,
                errors = ?entry.errors,
                "attempt rejected"
            );
            errors.extend(entry.errors.iter().map(|e| format!("attempt {attempt}: {e}")));
            self.record(&entry).await;
        }

        Err(GenerationError::Failed {
            attempts: self.policy.max_attempts,
            last_raw,
            errors,
        })
    }

    fn accept<A: ArtifactPlugin>(
        plugin: &A,
        request: &GenerationRequest,
        raw: &str,
        included: &[String],
        sent: &[&ContextRecord],
    ) -> Result<A::Output, Vec<String>> {
        let mut draft: A::Raw = parse::parse_contract(raw).map_err(|e| vec![e])?;
        plugin.check_contract(&draft)?;

        let mut check = CitationCheck::new(included);
        plugin.validate_citations(&mut draft, &mut check);
        let (valid_ids, warnings) = check.finish();
        let confidence = confidence::assess(&valid_ids, sent);
        Ok(plugin.finalize(
            draft,
            FinalizeContext {
                request,
                valid_ids,
                warnings,
                confidence,
                contexts: sent,
            },
        ))
    }

    async fn record(&self, entry: &AttemptRecord) {
        if let Err(e) = self.log.append(entry).await {
            tracing::warn!(transaction = %entry.transaction_id, "failed to write attempt log: {e}");
        }
    }
}
