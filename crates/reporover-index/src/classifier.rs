//! Ingestion priority, hard exclusions, and secret scanning.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const PRIORITY_DOCS: u8 = 0;
pub const PRIORITY_MANIFEST: u8 = 1;
pub const PRIORITY_CI: u8 = 2;
pub const PRIORITY_SOURCE: u8 = 3;
pub const PRIORITY_TEST: u8 = 4;
pub const PRIORITY_COMMUNITY: u8 = 5;
pub const PRIORITY_OTHER: u8 = 6;

const BLACKLIST_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "bmp", "pdf", "epub", "zip", "gz",
    "tar", "rar", "7z", "mp4", "mov", "avi", "mp3", "wav", "lock", "log", "sqlite", "db",
    "exe", "dll", "so", "a", "o", "class", "jar", "woff", "woff2", "ttf", "pyc",
];

const NOISE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    "target",
    ".tox",
];

const MANIFESTS: &[&str] = &[
    "package.json",
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "pipfile",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "cargo.toml",
    "gemfile",
    "composer.json",
    "tsconfig.json",
];

const CI_FILES: &[&str] = &[
    "dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
    ".gitlab-ci.yml",
    ".travis.yml",
    "jenkinsfile",
    "makefile",
    "procfile",
];

const COMMUNITY_PREFIXES: &[&str] = &[
    "contributing",
    "license",
    "licence",
    "code_of_conduct",
    "changelog",
    "authors",
    "security",
];

const SOURCE_DIRS: &[&str] = &[
    "src", "lib", "app", "pkg", "cmd", "internal", "backend", "frontend", "server", "client",
];

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs"];

/// Why a file never enters the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    BlacklistedExtension,
    NoiseDirectory,
    TooLarge,
    SecretFileName,
    SecretContent,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BlacklistedExtension => "blacklisted_extension",
            Self::NoiseDirectory => "noise_directory",
            Self::TooLarge => "too_large",
            Self::SecretFileName => "secret_file_name",
            Self::SecretContent => "secret_content",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Include { priority: u8 },
    Exclude(ExclusionReason),
}

impl Classification {
    #[must_use]
    pub fn priority(self) -> Option<u8> {
        match self {
            Self::Include { priority } => Some(priority),
            Self::Exclude(_) => None,
        }
    }
}

/// Decide from the path and byte size alone whether a file is worth fetching.
#[must_use]
pub fn classify_path(path: &str, size: u64, max_file_bytes: u64) -> Classification {
    let lower = path.to_ascii_lowercase();
    let (dirs, file_name) = match lower.rsplit_once('/') {
        Some((dirs, name)) => (dirs.split('/').collect::<Vec<_>>(), name),
        None => (Vec::new(), lower.as_str()),
    };

    if dirs.iter().any(|d| NOISE_DIRS.contains(d)) {
        return Classification::Exclude(ExclusionReason::NoiseDirectory);
    }
    if let Some((_, ext)) = file_name.rsplit_once('.')
        && BLACKLIST_EXTENSIONS.contains(&ext)
    {
        return Classification::Exclude(ExclusionReason::BlacklistedExtension);
    }
    if is_secret_file_name(file_name) {
        return Classification::Exclude(ExclusionReason::SecretFileName);
    }
    if size > max_file_bytes {
        return Classification::Exclude(ExclusionReason::TooLarge);
    }

    Classification::Include {
        priority: priority_for(&dirs, file_name),
    }
}

fn is_secret_file_name(name: &str) -> bool {
    name == ".env"
        || name.starts_with(".env.")
        || name == ".netrc"
        || name.starts_with("id_rsa")
        || name.starts_with("id_dsa")
        || name.starts_with("id_ecdsa")
        || name.starts_with("id_ed25519")
        || name.starts_with("credentials")
        || [".pem", ".key", ".p12", ".pfx", ".keystore"]
            .iter()
            .any(|ext| name.ends_with(ext))
}

fn priority_for(dirs: &[&str], file_name: &str) -> u8 {
    let stem = file_name.split('.').next().unwrap_or(file_name);

    if stem == "readme" || dirs.first().is_some_and(|d| *d == "docs" || *d == "doc") {
        PRIORITY_DOCS
    } else if MANIFESTS.contains(&file_name) {
        PRIORITY_MANIFEST
    } else if CI_FILES.contains(&file_name)
        || file_name.starts_with("dockerfile")
        || dirs.starts_with(&[".github", "workflows"])
        || dirs.first().is_some_and(|d| *d == ".circleci")
    {
        PRIORITY_CI
    } else if dirs.iter().any(|d| TEST_DIRS.contains(d)) || is_test_file_name(file_name) {
        PRIORITY_TEST
    } else if COMMUNITY_PREFIXES.iter().any(|p| stem == *p) {
        PRIORITY_COMMUNITY
    } else if dirs.iter().any(|d| SOURCE_DIRS.contains(d)) {
        PRIORITY_SOURCE
    } else {
        PRIORITY_OTHER
    }
}

fn is_test_file_name(name: &str) -> bool {
    name.starts_with("test_")
        || name.ends_with("_test.py")
        || name.ends_with("_test.go")
        || name.contains(".test.")
        || name.contains(".spec.")
}

/// Kind of secret found in decoded content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    AwsAccessKey,
    PrivateKey,
    ApiToken,
    Assignment,
}

static AWS_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b").expect("aws key regex is valid"));

static PRIVATE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-----BEGIN (?:[A-Z]+ )*PRIVATE KEY-----").expect("private key regex is valid")
});

static API_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:gh[pousr]_[A-Za-z0-9]{30,}|sk-[A-Za-z0-9_-]{20,}|xox[bpas]-[A-Za-z0-9-]{10,}|glpat-[A-Za-z0-9_-]{20})",
    )
    .expect("api token regex is valid")
});

static SECRET_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b[a-z0-9_]*(?:secret|api_?key|password|passwd|token)[a-z0-9_]*\s*[:=]\s*["'][^"'\s]{8,}["']"#,
    )
    .expect("secret assignment regex is valid")
});

/// Return the first secret-like pattern found in `text`.
#[must_use]
pub fn scan_content(text: &str) -> Option<SecretKind> {
    if PRIVATE_KEY.is_match(text) {
        Some(SecretKind::PrivateKey)
    } else if AWS_KEY.is_match(text) {
        Some(SecretKind::AwsAccessKey)
    } else if API_TOKEN.is_match(text) {
        Some(SecretKind::ApiToken)
    } else if SECRET_ASSIGNMENT.is_match(text) {
        Some(SecretKind::Assignment)
    } else {
        None
    }
}

/// A candidate blob from the repository tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: String,
    pub size: u64,
    pub sha: String,
    pub priority: u8,
}

/// Sort by (priority asc, size desc, path asc) and keep at most `max_files`.
#[must_use]
pub fn select_files(mut candidates: Vec<Candidate>, max_files: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(b.size.cmp(&a.size))
            .then_with(|| a.path.cmp(&b.path))
    });
    candidates.truncate(max_files);
    candidates
}
