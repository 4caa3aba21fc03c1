//! The facade the binary talks to: ingest once, then generate from the stored
//! corpus through the cache.

use reporover_index::ContextRecord;
use reporover_index::embedder::{EmbeddingIndexer, EmbeddingReport};
use reporover_index::graph::{Graph, build_graph};
use reporover_index::host::{CodeHost, RepoRef};
use reporover_index::ingest::{IngestReport, Ingestor};
use reporover_index::retriever::Retriever;
use reporover_index::store::CorpusStore;
use reporover_llm::LlmProvider;
use serde::Serialize;

use crate::artifacts::{
    Artifact, Explanation, ExplanationPlugin, Hint, HintPlugin, Lesson, LessonPlan, LessonPlugin,
    Question, Quiz, QuizPlugin,
};
use crate::ask::{AskAnswer, ask};
use crate::cache::{ArtifactCache, CacheKey};
use crate::config::Config;
use crate::engine::{
    ArtifactPlugin, GenerationRequest, GroundedEngine, RetryPolicy, Selection, priority_fallback,
};
use crate::error::TutorError;
use crate::overlay::overlay_lessons;
use crate::txlog::TransactionLog;

pub const WHOLE_FILE_TARGET: &str = "file";

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub ingest: IngestReport,
    pub embedding: EmbeddingReport,
}

pub struct Tutor<P, S, L, C> {
    provider: P,
    store: S,
    log: L,
    cache: C,
    config: Config,
}

impl<P, S, L, C> Tutor<P, S, L, C>
where
    P: LlmProvider,
    S: CorpusStore,
    L: TransactionLog,
    C: ArtifactCache,
{
    #[must_use]
    pub fn new(provider: P, store: S, log: L, cache: C, config: Config) -> Self {
        Self {
            provider,
            store,
            log,
            cache,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Fetch, extract, embed and store a repository, replacing any previous
    /// corpus and dropping its cached artifacts.
    ///
    /// # Errors
    ///
    /// Fails when the tree cannot be fetched or the corpus cannot be saved.
    pub async fn ingest<H: CodeHost>(
        &self,
        host: &H,
        repo: &RepoRef,
    ) -> Result<IngestOutcome, TutorError> {
        let ingestor = Ingestor::new(
            host,
            self.config.ingest.clone(),
            self.config.chunking.clone(),
        );
        let (mut records, ingest) = ingestor.run(repo).await?;
        let embedding = EmbeddingIndexer::new(&self.provider, self.config.embedding.clone())
            .index(&mut records)
            .await;
        let repo_id = repo.id();
        self.store.save(&repo_id, &records).await?;
        let dropped = self.cache.invalidate_repo(&repo_id).await?;
        tracing::info!(
            repo = %repo_id,
            records = records.len(),
            embedded = embedding.embedded,
            cache_dropped = dropped,
            "ingestion complete"
        );
        Ok(IngestOutcome { ingest, embedding })
    }

    /// # Errors
    ///
    /// `NotIngested` when nothing is stored for `repo_id`.
    pub async fn corpus(&self, repo_id: &str) -> Result<Vec<ContextRecord>, TutorError> {
        self.store
            .load(repo_id)
            .await?
            .ok_or_else(|| TutorError::NotIngested(repo_id.to_owned()))
    }

    fn engine(&self) -> GroundedEngine<'_, P, L> {
        GroundedEngine::new(
            &self.provider,
            &self.log,
            RetryPolicy::with_max_attempts(self.config.generation.max_attempts),
        )
    }

    /// Serve from cache, or generate and store.
    async fn cached<A: ArtifactPlugin>(
        &self,
        plugin: &A,
        request: &GenerationRequest,
        candidates: &[ContextRecord],
        unwrap: fn(Artifact) -> Option<A::Output>,
        wrap: fn(A::Output) -> Artifact,
    ) -> Result<A::Output, TutorError>
    where
        A::Output: Clone,
    {
        let key = CacheKey::new(
            plugin.kind(),
            &request.repo_id,
            &request.target,
            &request.goal,
            candidates,
        );
        match self.cache.get(&key).await {
            Ok(Some(hit)) => {
                if let Some(output) = unwrap(hit) {
                    tracing::debug!(kind = %plugin.kind(), key = %key.digest, "cache hit");
                    return Ok(output);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key.digest, "unreadable cache entry, regenerating: {e}"),
        }

        let output = self.engine().generate(plugin, request, candidates).await?.artifact;
        if let Err(e) = self.cache.put(&key, &wrap(output.clone())).await {
            tracing::warn!(key = %key.digest, "failed to cache artifact: {e}");
        }
        Ok(output)
    }

    /// Explain `target` (or the whole file when `None`) of one file.
    ///
    /// # Errors
    ///
    /// `UnknownFile` when the corpus has no records for `path`, otherwise any
    /// generation failure.
    pub async fn explain_file(
        &self,
        repo_id: &str,
        path: &str,
        target: Option<&str>,
    ) -> Result<Explanation, TutorError> {
        let corpus = self.corpus(repo_id).await?;
        let candidates: Vec<ContextRecord> = corpus
            .into_iter()
            .filter(|r| r.file_path == path)
            .collect();
        if candidates.is_empty() {
            return Err(TutorError::UnknownFile {
                repo_id: repo_id.to_owned(),
                path: path.to_owned(),
            });
        }
        let target = target.unwrap_or(WHOLE_FILE_TARGET);
        let request = GenerationRequest {
            repo_id: repo_id.to_owned(),
            target: target.to_owned(),
            goal: String::new(),
            selection: Selection::Retrieve {
                query: format!("explain {target} in {path}"),
                top_k: self.config.retrieval.top_k,
            },
        };
        let plugin = ExplanationPlugin::new(path, &self.config.generation);
        self.cached(
            &plugin,
            &request,
            &candidates,
            |a| match a {
                Artifact::Explanation(e) => Some(e),
                _ => None,
            },
            Artifact::Explanation,
        )
        .await
    }

    /// Lesson contexts: top matches for the goal restricted to important
    /// files, or the highest-priority records when that leaves nothing.
    async fn lesson_contexts(&self, corpus: &[ContextRecord], goal: &str) -> Vec<ContextRecord> {
        let retrieval = &self.config.retrieval;
        let hits = Retriever::new(&self.provider)
            .retrieve(goal, corpus, retrieval.lesson_top_k)
            .await;
        let selected: Vec<ContextRecord> = hits
            .into_iter()
            .filter(|h| h.record.priority <= retrieval.lesson_max_priority)
            .take(retrieval.lesson_contexts)
            .map(|h| h.record.clone())
            .collect();
        if !selected.is_empty() {
            return selected;
        }
        tracing::info!(goal, "no prioritised matches, using priority fallback");
        priority_fallback(corpus, retrieval.lesson_top_k)
            .into_iter()
            .cloned()
            .collect()
    }

    /// # Errors
    ///
    /// Any ingestion-state or generation failure.
    pub async fn generate_lessons(
        &self,
        repo_id: &str,
        goal: &str,
    ) -> Result<LessonPlan, TutorError> {
        let corpus = self.corpus(repo_id).await?;
        let contexts = self.lesson_contexts(&corpus, goal).await;
        let request = GenerationRequest {
            repo_id: repo_id.to_owned(),
            target: String::new(),
            goal: goal.to_owned(),
            selection: Selection::Preselected,
        };
        let plugin = LessonPlugin::new(&self.config.generation);
        self.cached(
            &plugin,
            &request,
            &contexts,
            |a| match a {
                Artifact::Lessons(p) => Some(p),
                _ => None,
            },
            Artifact::Lessons,
        )
        .await
    }

    /// A full quiz when the lesson cites enough material, otherwise a single
    /// practice question.
    ///
    /// # Errors
    ///
    /// Any generation failure; a lesson with no resolved citations is
    /// `InsufficientContext`.
    pub async fn generate_quiz(&self, repo_id: &str, lesson: &Lesson) -> Result<Quiz, TutorError> {
        let contexts = lesson.cited_records();
        let generation = &self.config.generation;
        let plugin = if contexts.len() < generation.min_quiz_contexts {
            tracing::info!(
                lesson = %lesson.lesson_id,
                contexts = contexts.len(),
                "too few cited contexts, generating a practice question"
            );
            QuizPlugin::practice(lesson, generation)
        } else {
            QuizPlugin::for_lesson(lesson, generation)
        };
        let request = GenerationRequest {
            repo_id: repo_id.to_owned(),
            target: lesson.lesson_id.clone(),
            goal: lesson.title.clone(),
            selection: Selection::Preselected,
        };
        self.cached(&plugin, &request, &contexts, Artifact::into_quiz, Artifact::from)
            .await
    }

    /// # Errors
    ///
    /// Any ingestion-state or generation failure.
    pub async fn hint(&self, repo_id: &str, question: &Question) -> Result<Hint, TutorError> {
        let limit = self.config.retrieval.hint_contexts;
        let evidence: Vec<ContextRecord> =
            question.evidence_full.iter().take(limit).cloned().collect();
        // Without evidence, search the whole corpus; the engine falls back to
        // priority order when the search comes back empty.
        let (contexts, selection) = if evidence.is_empty() {
            let selection = Selection::Retrieve {
                query: question.question.clone(),
                top_k: limit,
            };
            (self.corpus(repo_id).await?, selection)
        } else {
            (evidence, Selection::Preselected)
        };
        let request = GenerationRequest {
            repo_id: repo_id.to_owned(),
            target: question.qid.clone(),
            goal: question.question.clone(),
            selection,
        };
        let plugin = HintPlugin::new(question.clone(), &self.config.generation);
        self.cached(
            &plugin,
            &request,
            &contexts,
            |a| match a {
                Artifact::Hint(h) => Some(h),
                _ => None,
            },
            Artifact::Hint,
        )
        .await
    }

    /// File graph of the corpus, with lessons layered on when given.
    ///
    /// # Errors
    ///
    /// `NotIngested` when nothing is stored for `repo_id`.
    pub async fn graph(
        &self,
        repo_id: &str,
        plan: Option<&LessonPlan>,
    ) -> Result<Graph, TutorError> {
        let corpus = self.corpus(repo_id).await?;
        let mut graph = build_graph(&corpus, self.config.graph.max_files);
        if let Some(plan) = plan {
            overlay_lessons(&mut graph, plan);
        }
        Ok(graph)
    }

    /// # Errors
    ///
    /// Any ingestion-state failure, an empty context set, or a refused stream.
    pub async fn ask(&self, repo_id: &str, question: &str) -> Result<AskAnswer, TutorError> {
        let corpus = self.corpus(repo_id).await?;
        ask(
            &self.provider,
            question,
            &corpus,
            &self.config.retrieval,
            &self.config.generation,
        )
        .await
    }

    /// Drop cached artifacts of one repository, or all of them.
    ///
    /// # Errors
    ///
    /// Returns an error if cache entries cannot be removed.
    pub async fn clear_cache(&self, repo_id: Option<&str>) -> Result<usize, TutorError> {
        let removed = match repo_id {
            Some(repo_id) => self.cache.invalidate_repo(repo_id).await?,
            None => self.cache.clear().await?,
        };
        Ok(removed)
    }
}
