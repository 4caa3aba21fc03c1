//! Language-aware extraction of context records from one file.

mod markdown;
#[cfg(feature = "lang-python")]
mod python;
mod script;

use serde::{Deserialize, Serialize};

use crate::chunker::{WindowConfig, sliding_window};
use crate::error::Result;
use crate::languages::Lang;
use crate::record::{ContextRecord, FileSource, RecordKind};

/// Extraction thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Windows for files without a dedicated strategy.
    pub generic: WindowConfig,
    /// Re-split threshold for markdown sections and docstrings.
    pub prose: WindowConfig,
    /// Re-split threshold for functions, classes and script windows.
    pub code: WindowConfig,
    /// Lines kept before a matched function line.
    pub script_lines_before: usize,
    /// Lines kept from a matched function line onwards.
    pub script_lines_after: usize,
    /// Char cap for the whole-file fallback of pattern-based extraction.
    pub whole_file_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            generic: WindowConfig::new(3000, 200),
            prose: WindowConfig::new(2000, 200),
            code: WindowConfig::new(4000, 300),
            script_lines_before: 2,
            script_lines_after: 40,
            whole_file_chars: 20_000,
        }
    }
}

/// Turn one file's text into context records.
///
/// # Errors
///
/// Returns `IndexError::Parse` when a structured parse fails; no records are
/// produced for that file.
pub fn extract(
    source: &FileSource<'_>,
    text: &str,
    config: &ExtractConfig,
) -> Result<Vec<ContextRecord>> {
    let normalized = text.replace("\r\n", "\n");
    let units = match source.lang {
        #[cfg(feature = "lang-python")]
        Lang::Python => python::extract(source, &normalized)?,
        Lang::JavaScript | Lang::TypeScript => script::extract(source, &normalized, config),
        Lang::Markdown => markdown::extract(source, &normalized),
        #[allow(unreachable_patterns)]
        _ => generic(source, &normalized, config.generic),
    };
    Ok(split_oversized(units, config))
}

fn generic(source: &FileSource<'_>, text: &str, window: WindowConfig) -> Vec<ContextRecord> {
    sliding_window(text, window)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            ContextRecord::new(
                source,
                source.record_id(&i.to_string()),
                RecordKind::Window,
                chunk.to_owned(),
            )
            .with_chunk_index(i)
        })
        .collect()
}

fn split_oversized(units: Vec<ContextRecord>, config: &ExtractConfig) -> Vec<ContextRecord> {
    let mut out = Vec::with_capacity(units.len());
    for unit in units {
        let window = match unit.kind {
            RecordKind::Window => {
                out.push(unit);
                continue;
            }
            RecordKind::ModuleDoc | RecordKind::Section => config.prose,
            RecordKind::Imports
            | RecordKind::Function
            | RecordKind::Class
            | RecordKind::File => config.code,
        };
        if unit.content.chars().count() <= window.size {
            out.push(unit);
            continue;
        }

        let source = FileSource {
            repo_id: &unit.repo_id,
            path: &unit.file_path,
            lang: unit.language,
            priority: unit.priority,
        };
        for (i, chunk) in sliding_window(&unit.content, window).into_iter().enumerate() {
            let mut child = ContextRecord::new(
                &source,
                format!("{}#{i}", unit.id),
                unit.kind,
                chunk.to_owned(),
            )
            .with_chunk_index(i);
            if i == 0 {
                child.start_line = unit.start_line;
            }
            out.push(child);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(path: &'static str, lang: Lang) -> FileSource<'static> {
        FileSource {
            repo_id: "acme/widgets",
            path,
            lang,
            priority: 3,
        }
    }

    #[test]
    fn generic_text_windows_have_no_lines() {
        let config = ExtractConfig {
            generic: WindowConfig::new(10, 2),
            ..ExtractConfig::default()
        };
        let text = "x".repeat(25);
        let records = extract(&source("notes.txt", Lang::Text), &text, &config).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, "acme/widgets:notes.txt:0");
        assert_eq!(records[2].id, "acme/widgets:notes.txt:2");
        assert!(records.iter().all(|r| r.start_line.is_none()));
        assert_eq!(records[1].chunk_index, 1);
    }

    #[test]
    fn empty_text_file_yields_nothing() {
        let records = extract(&source("empty.txt", Lang::Text), "", &ExtractConfig::default())
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn crlf_is_normalized() {
        let records = extract(
            &source("README.md", Lang::Markdown),
            "# Setup\r\nRun it.\r\n",
            &ExtractConfig::default(),
        )
        .unwrap();
        assert_eq!(records[0].content, "Setup\n\nRun it.");
    }

    #[test]
    fn oversized_section_is_resplit_with_parent_prefix() {
        let config = ExtractConfig {
            prose: WindowConfig::new(50, 10),
            ..ExtractConfig::default()
        };
        let text = format!("# Guide\n{}", "word ".repeat(40));
        let records = extract(&source("README.md", Lang::Markdown), &text, &config).unwrap();
        assert!(records.len() > 1);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.id, format!("acme/widgets:README.md:section:0#{i}"));
            assert_eq!(r.kind, RecordKind::Section);
            assert_eq!(r.chunk_index, i);
            assert!(r.content.chars().count() <= 50);
        }
        assert_eq!(records[0].start_line, Some(1));
        assert!(records[1].start_line.is_none());
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "# Setup\nRun `make install`.\n\n## Usage\nCall start().\n";
        let src = source("README.md", Lang::Markdown);
        let a = extract(&src, text, &ExtractConfig::default()).unwrap();
        let b = extract(&src, text, &ExtractConfig::default()).unwrap();
        let ids = |rs: &[ContextRecord]| {
            rs.iter()
                .map(|r| (r.id.clone(), r.checksum.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&a), ids(&b));
    }
}
