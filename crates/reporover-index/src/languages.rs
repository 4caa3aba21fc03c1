//! Language detection and tree-sitter grammar registry.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Language tag carried by every context record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    JavaScript,
    TypeScript,
    Markdown,
    Text,
}

impl Lang {
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Markdown => "markdown",
            Self::Text => "text",
        }
    }

    /// Prose rather than code; drives source diversity in confidence scoring.
    #[must_use]
    pub fn is_docs(self) -> bool {
        matches!(self, Self::Markdown | Self::Text)
    }

    /// Get the tree-sitter grammar. Returns `None` for languages extracted without
    /// a parser, or when the corresponding feature is disabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension. Anything unrecognised is plain text.
#[must_use]
pub fn detect_language(path: &Path) -> Lang {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("py" | "pyi") => Lang::Python,
        Some("js" | "jsx" | "mjs" | "cjs") => Lang::JavaScript,
        Some("ts" | "tsx" | "mts" | "cts") => Lang::TypeScript,
        Some("md" | "markdown" | "mdx") => Lang::Markdown,
        _ => Lang::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_py() {
        assert_eq!(detect_language(Path::new("src/app.py")), Lang::Python);
    }

    #[test]
    fn detect_language_js_variants() {
        for ext in &["js", "jsx", "mjs", "cjs"] {
            let path = format!("file.{ext}");
            assert_eq!(
                detect_language(Path::new(&path)),
                Lang::JavaScript,
                "failed for .{ext}"
            );
        }
    }

    #[test]
    fn detect_language_ts_variants() {
        for ext in &["ts", "tsx", "mts", "cts"] {
            let path = format!("file.{ext}");
            assert_eq!(
                detect_language(Path::new(&path)),
                Lang::TypeScript,
                "failed for .{ext}"
            );
        }
    }

    #[test]
    fn detect_language_markdown_case_insensitive() {
        assert_eq!(detect_language(Path::new("README.MD")), Lang::Markdown);
    }

    #[test]
    fn unknown_extension_is_text() {
        assert_eq!(detect_language(Path::new("Makefile")), Lang::Text);
        assert_eq!(detect_language(Path::new("config.yaml")), Lang::Text);
    }

    #[test]
    fn docs_languages() {
        assert!(Lang::Markdown.is_docs());
        assert!(Lang::Text.is_docs());
        assert!(!Lang::Python.is_docs());
        assert!(!Lang::TypeScript.is_docs());
    }

    #[test]
    fn grammar_only_for_python() {
        #[cfg(feature = "lang-python")]
        assert!(Lang::Python.grammar().is_some());
        assert!(Lang::JavaScript.grammar().is_none());
        assert!(Lang::Markdown.grammar().is_none());
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&Lang::JavaScript).unwrap();
        assert_eq!(json, "\"javascript\"");
    }
}
