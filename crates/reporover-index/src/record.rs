//! The context record: the atomic unit of retrieval.

use serde::{Deserialize, Serialize};

use crate::languages::Lang;

/// Maximum preview length, in chars, used inside prompts.
pub const EXCERPT_CHARS: usize = 400;

/// Structural role of a record within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    ModuleDoc,
    /// Module-level import statements of one source file.
    Imports,
    Function,
    Class,
    Section,
    File,
    Window,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub id: String,
    pub repo_id: String,
    pub file_path: String,
    pub checksum: String,
    pub language: Lang,
    pub kind: RecordKind,
    pub content: String,
    pub excerpt: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub chunk_index: usize,
    pub embedding: Option<Vec<f32>>,
    pub priority: u8,
}

/// Identity shared by every record extracted from one file.
#[derive(Debug, Clone, Copy)]
pub struct FileSource<'a> {
    pub repo_id: &'a str,
    pub path: &'a str,
    pub lang: Lang,
    pub priority: u8,
}

impl FileSource<'_> {
    /// `repo:path:<locator>`
    #[must_use]
    pub fn record_id(&self, locator: &str) -> String {
        format!("{}:{}:{locator}", self.repo_id, self.path)
    }
}

impl ContextRecord {
    #[must_use]
    pub fn new(source: &FileSource<'_>, id: String, kind: RecordKind, content: String) -> Self {
        Self {
            checksum: content_checksum(&content),
            excerpt: excerpt(&content),
            id,
            repo_id: source.repo_id.to_owned(),
            file_path: source.path.to_owned(),
            language: source.lang,
            kind,
            content,
            start_line: None,
            end_line: None,
            chunk_index: 0,
            embedding: None,
            priority: source.priority,
        }
    }

    #[must_use]
    pub fn with_lines(mut self, start: usize, end: usize) -> Self {
        self.start_line = Some(start);
        self.end_line = Some(end);
        self
    }

    #[must_use]
    pub fn with_chunk_index(mut self, index: usize) -> Self {
        self.chunk_index = index;
        self
    }

    #[must_use]
    pub fn is_docs(&self) -> bool {
        self.language.is_docs()
    }

    /// Copy suitable for attaching to artifacts: the vector is dropped.
    #[must_use]
    pub fn without_embedding(&self) -> Self {
        Self {
            embedding: None,
            ..self.clone()
        }
    }
}

#[must_use]
pub fn content_checksum(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// First `EXCERPT_CHARS` chars of `content`.
#[must_use]
pub fn excerpt(content: &str) -> String {
    match content.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => content[..idx].to_owned(),
        None => content.to_owned(),
    }
}
