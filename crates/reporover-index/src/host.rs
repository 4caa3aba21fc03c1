//! Code-host adapters: repository tree listing and blob download.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_MAX_RETRIES: u32 = 3;

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("repo name regex is valid"));

/// `owner/repo` on the code host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Corpus key, `owner/repo`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Parse `https://github.com/o/r(.git)(/...)`, `github.com/o/r` or `o/r`.
///
/// # Errors
///
/// Returns `IndexError::InvalidRepo` for other hosts or malformed names.
pub fn parse_repo_ref(input: &str) -> Result<RepoRef> {
    let invalid = || IndexError::InvalidRepo(input.to_owned());
    let trimmed = input.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);

    let has_scheme = without_scheme.len() != trimmed.len();

    let mut parts: Vec<&str> = without_scheme.split('/').filter(|s| !s.is_empty()).collect();
    let on_github = parts.first().is_some_and(|h| {
        h.eq_ignore_ascii_case("github.com") || h.eq_ignore_ascii_case("www.github.com")
    });
    if on_github {
        parts.remove(0);
    } else if has_scheme || parts.len() != 2 {
        return Err(invalid());
    }

    let [owner, repo, ..] = parts[..] else {
        return Err(invalid());
    };
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if !NAME.is_match(owner) || !NAME.is_match(repo) {
        return Err(invalid());
    }
    Ok(RepoRef {
        owner: owner.to_owned(),
        repo: repo.to_owned(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: u64,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTree {
    pub sha: String,
    #[serde(rename = "tree")]
    pub entries: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// Source of repository trees and file blobs.
pub trait CodeHost: Send + Sync {
    /// Recursive listing of the default branch.
    ///
    /// # Errors
    ///
    /// Returns an error when the listing cannot be fetched; ingestion cannot proceed.
    fn repository_tree(&self, repo: &RepoRef) -> impl Future<Output = Result<RepoTree>> + Send;

    /// Base64 content of one blob.
    ///
    /// # Errors
    ///
    /// Returns an error when the blob cannot be fetched.
    fn blob(&self, repo: &RepoRef, sha: &str) -> impl Future<Output = Result<String>> + Send;
}

/// GitHub REST v3 client.
#[derive(Clone)]
pub struct GitHubHost {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    max_retries: u32,
}

impl std::fmt::Debug for GitHubHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubHost")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct BlobResponse {
    content: String,
}

impl GitHubHost {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: reporover_llm::http::default_client(),
            base_url: GITHUB_API_URL.to_owned(),
            token,
            max_retries: GITHUB_MAX_RETRIES,
        }
    }

    /// Override the API root. Intended for tests and GitHub Enterprise.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = reporover_llm::retry::send_with_retry("github", self.max_retries, || {
            let mut request = self
                .client
                .get(url)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28");
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }
            request.send()
        })
        .await
        .map_err(|e| IndexError::Host(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexError::Host(format!("{url}: HTTP {}", status.as_u16())));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| IndexError::Host(format!("{url}: {e}")))
    }
}

impl CodeHost for GitHubHost {
    async fn repository_tree(&self, repo: &RepoRef) -> Result<RepoTree> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/HEAD?recursive=1",
            self.base_url, repo.owner, repo.repo
        );
        let tree: RepoTree = self.get_json(&url).await?;
        if tree.truncated {
            tracing::warn!(repo = %repo, entries = tree.entries.len(), "repository tree is truncated");
        }
        Ok(tree)
    }

    async fn blob(&self, repo: &RepoRef, sha: &str) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/git/blobs/{sha}",
            self.base_url, repo.owner, repo.repo
        );
        let blob: BlobResponse = self.get_json(&url).await?;
        Ok(blob.content)
    }
}

/// Serves a checked-out directory as if it were a hosted repository.
///
/// `.gitignore` rules are honoured. Blob shas are BLAKE3 hashes of file bytes.
#[derive(Debug)]
pub struct LocalDirHost {
    root: PathBuf,
    blobs: Mutex<HashMap<String, PathBuf>>,
}

impl LocalDirHost {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            blobs: Mutex::new(HashMap::new()),
        }
    }

    fn walk(&self) -> Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        let mut blobs = HashMap::new();
        let walker = ignore::WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(|e| e.file_name() != ".git")
            .build();

        for entry in walker.flatten() {
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(path) = relative_path(&self.root, entry.path()) else {
                continue;
            };
            let bytes = std::fs::read(entry.path())?;
            let sha = blake3::hash(&bytes).to_hex().to_string();
            entries.push(TreeEntry {
                path,
                kind: EntryKind::Blob,
                size: bytes.len() as u64,
                sha: sha.clone(),
            });
            blobs.insert(sha, entry.path().to_path_buf());
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        if let Ok(mut guard) = self.blobs.lock() {
            *guard = blobs;
        }
        Ok(entries)
    }
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

impl CodeHost for LocalDirHost {
    async fn repository_tree(&self, _repo: &RepoRef) -> Result<RepoTree> {
        if !self.root.is_dir() {
            return Err(IndexError::Host(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        let entries = self.walk()?;
        let mut hasher = blake3::Hasher::new();
        for entry in &entries {
            hasher.update(entry.path.as_bytes());
            hasher.update(entry.sha.as_bytes());
        }
        Ok(RepoTree {
            sha: hasher.finalize().to_hex().to_string(),
            entries,
            truncated: false,
        })
    }

    async fn blob(&self, _repo: &RepoRef, sha: &str) -> Result<String> {
        let path = self
            .blobs
            .lock()
            .ok()
            .and_then(|blobs| blobs.get(sha).cloned())
            .ok_or_else(|| IndexError::Host(format!("unknown blob {sha}")))?;
        let bytes = tokio::fs::read(&path).await?;
        Ok(STANDARD.encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn parses_repo_reference_forms() {
        let expected = RepoRef {
            owner: "acme".into(),
            repo: "widgets".into(),
        };
        for input in [
            "acme/widgets",
            "github.com/acme/widgets",
            "https://github.com/acme/widgets",
            "https://github.com/acme/widgets.git",
            "https://github.com/acme/widgets/tree/main/src",
            "http://www.github.com/acme/widgets/",
        ] {
            assert_eq!(parse_repo_ref(input).unwrap(), expected, "{input}");
        }
        assert_eq!(expected.id(), "acme/widgets");
    }

    #[test]
    fn rejects_bad_references() {
        for input in ["", "acme", "https://gitlab.com/acme/widgets", "acme/wid gets", "/"] {
            assert!(parse_repo_ref(input).is_err(), "{input}");
        }
    }

    #[tokio::test]
    async fn github_tree_and_blob() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/git/trees/HEAD"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "abc",
                "truncated": false,
                "tree": [
                    {"path": "README.md", "type": "blob", "size": 12, "sha": "s1"},
                    {"path": "src", "type": "tree", "sha": "s2"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/git/blobs/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": "IyBTZXR1cAo=\n",
                "encoding": "base64"
            })))
            .mount(&server)
            .await;

        let host = GitHubHost::new(Some("t0ken".into())).with_base_url(server.uri());
        let repo = parse_repo_ref("acme/widgets").unwrap();
        let tree = host.repository_tree(&repo).await.unwrap();
        assert_eq!(tree.entries.len(), 2);
        assert_eq!(tree.entries[0].kind, EntryKind::Blob);
        assert_eq!(tree.entries[1].size, 0);
        let blob = host.blob(&repo, "s1").await.unwrap();
        assert_eq!(blob, "IyBTZXR1cAo=\n");
    }

    #[tokio::test]
    async fn github_error_status_is_host_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let host = GitHubHost::new(None).with_base_url(server.uri());
        let err = host
            .repository_tree(&parse_repo_ref("acme/missing").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Host(msg) if msg.contains("404")));
    }

    #[test]
    fn debug_redacts_token() {
        let host = GitHubHost::new(Some("secret-token".into()));
        assert!(!format!("{host:?}").contains("secret-token"));
    }

    #[tokio::test]
    async fn local_dir_serves_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("README.md"), "# Setup\n").unwrap();
        std::fs::write(dir.path().join("src/app.py"), "def start():\n    pass\n").unwrap();

        let host = LocalDirHost::new(dir.path());
        let repo = parse_repo_ref("local/demo").unwrap();
        let tree = host.repository_tree(&repo).await.unwrap();
        let paths: Vec<_> = tree.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["README.md", "src/app.py"]);

        let encoded = host.blob(&repo, &tree.entries[0].sha).await.unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"# Setup\n");
    }

    #[tokio::test]
    async fn local_dir_unknown_blob_fails() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalDirHost::new(dir.path());
        assert!(host.blob(&parse_repo_ref("a/b").unwrap(), "nope").await.is_err());
    }
}
