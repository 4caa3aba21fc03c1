//! Repository ingestion: tree, classify, select, fetch, decode, scan, extract.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::classifier::{
    Candidate, Classification, ExclusionReason, classify_path, scan_content, select_files,
};
use crate::error::{IndexError, IngestError};
use crate::extract::{ExtractConfig, extract};
use crate::host::{CodeHost, EntryKind, RepoRef};
use crate::languages::detect_language;
use crate::record::{ContextRecord, FileSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_files: usize,
    pub max_file_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_files: 200,
            max_file_bytes: 500_000,
        }
    }
}

/// Per-run counters. Nothing here is an error: every skipped file is counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub repo_id: String,
    pub tree_sha: String,
    pub truncated: bool,
    pub excluded: BTreeMap<ExclusionReason, usize>,
    /// Included by policy but cut by `max_files`.
    pub over_limit: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    pub decode_failures: usize,
    pub secret_exclusions: usize,
    pub parse_failures: usize,
    pub duplicate_ids: usize,
    pub records: usize,
}

impl IngestReport {
    fn exclude(&mut self, reason: ExclusionReason) {
        *self.excluded.entry(reason).or_default() += 1;
    }
}

/// Decode a base64 blob (line breaks allowed) into UTF-8 text.
///
/// # Errors
///
/// Returns `IndexError::Decode` for bad base64, invalid UTF-8 or binary content.
pub fn decode_blob(path: &str, encoded: &str) -> Result<String, IndexError> {
    let decode_err = |reason: String| IndexError::Decode {
        path: path.to_owned(),
        reason,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| decode_err(e.to_string()))?;
    if bytes.contains(&0) {
        return Err(decode_err("binary content".into()));
    }
    String::from_utf8(bytes).map_err(|e| decode_err(e.to_string()))
}

pub struct Ingestor<'a, H: CodeHost> {
    host: &'a H,
    config: IngestConfig,
    extract: ExtractConfig,
}

impl<'a, H: CodeHost> Ingestor<'a, H> {
    #[must_use]
    pub fn new(host: &'a H, config: IngestConfig, extract: ExtractConfig) -> Self {
        Self {
            host,
            config,
            extract,
        }
    }

    /// Build the corpus for `repo`. Records come back without embeddings.
    ///
    /// # Errors
    ///
    /// Only a failed tree listing aborts the run; per-file problems are counted
    /// in the report.
    pub async fn run(
        &self,
        repo: &RepoRef,
    ) -> Result<(Vec<ContextRecord>, IngestReport), IngestError> {
        let repo_id = repo.id();
        let tree = self
            .host
            .repository_tree(repo)
            .await
            .map_err(|source| IngestError::Fetch {
                repo: repo_id.clone(),
                source,
            })?;

        let mut report = IngestReport {
            repo_id: repo_id.clone(),
            tree_sha: tree.sha.clone(),
            truncated: tree.truncated,
            ..IngestReport::default()
        };

        let mut candidates = Vec::new();
        for entry in tree.entries.iter().filter(|e| e.kind == EntryKind::Blob) {
            match classify_path(&entry.path, entry.size, self.config.max_file_bytes) {
                Classification::Include { priority } => candidates.push(Candidate {
                    path: entry.path.clone(),
                    size: entry.size,
                    sha: entry.sha.clone(),
                    priority,
                }),
                Classification::Exclude(reason) => {
                    tracing::trace!(path = %entry.path, %reason, "excluded");
                    report.exclude(reason);
                }
            }
        }
        let included = candidates.len();
        let selected = select_files(candidates, self.config.max_files);
        report.over_limit = included - selected.len();
        tracing::info!(
            repo = %repo,
            entries = tree.entries.len(),
            selected = selected.len(),
            over_limit = report.over_limit,
            "files selected"
        );

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        for file in &selected {
            let Some(text) = self.fetch_text(repo, file, &mut report).await else {
                continue;
            };
            if let Some(kind) = scan_content(&text) {
                tracing::debug!(path = %file.path, ?kind, "secret-bearing content, file skipped");
                report.secret_exclusions += 1;
                report.exclude(ExclusionReason::SecretContent);
                continue;
            }

            let source = FileSource {
                repo_id: &repo_id,
                path: &file.path,
                lang: detect_language(Path::new(&file.path)),
                priority: file.priority,
            };
            match extract(&source, &text, &self.extract) {
                Ok(units) => {
                    for unit in units {
                        if seen.insert(unit.id.clone()) {
                            records.push(unit);
                        } else {
                            report.duplicate_ids += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %file.path, "extraction failed, file skipped: {e}");
                    report.parse_failures += 1;
                }
            }
        }

        report.records = records.len();
        tracing::info!(
            repo = %repo,
            fetched = report.fetched,
            records = report.records,
            fetch_failures = report.fetch_failures,
            decode_failures = report.decode_failures,
            secret_exclusions = report.secret_exclusions,
            parse_failures = report.parse_failures,
            "ingestion complete"
        );
        Ok((records, report))
    }

    async fn fetch_text(
        &self,
        repo: &RepoRef,
        file: &Candidate,
        report: &mut IngestReport,
    ) -> Option<String> {
        let encoded = match self.host.blob(repo, &file.sha).await {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(path = %file.path, "blob fetch failed: {e}");
                report.fetch_failures += 1;
                return None;
            }
        };
        report.fetched += 1;
        match decode_blob(&file.path, &encoded) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!("{e}");
                report.decode_failures += 1;
                None
            }
        }
    }
}
