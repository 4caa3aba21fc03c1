use reporover_index::ContextRecord;
use serde::{Deserialize, Serialize};

use super::{ArtifactKind, GROUNDING_RULES, blank, contexts_section};
use crate::config::GenerationConfig;
use crate::engine::{
    ArtifactPlugin, CitationCheck, Confidence, FinalizeContext, GenerationRequest,
};

pub const KEY_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTest {
    pub title: String,
    pub code: String,
    #[serde(default = "default_test_language")]
    pub language: String,
}

fn default_test_language() -> String {
    "python".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub repo_id: String,
    pub file_path: String,
    pub target: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub unit_test: UnitTest,
    pub example: String,
    pub sources: Vec<String>,
    pub sources_full: Vec<ContextRecord>,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExplanationDraft {
    pub summary: String,
    pub key_points: Vec<String>,
    pub unit_test: UnitTest,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Explains one target (a function, class, or the whole file) of one file.
#[derive(Debug, Clone)]
pub struct ExplanationPlugin {
    pub file_path: String,
    pub char_budget: usize,
    pub temperature: f32,
}

impl ExplanationPlugin {
    #[must_use]
    pub fn new(file_path: impl Into<String>, config: &GenerationConfig) -> Self {
        Self {
            file_path: file_path.into(),
            char_budget: config.explanation_budget,
            temperature: config.explanation_temperature,
        }
    }
}

impl ArtifactPlugin for ExplanationPlugin {
    type Raw = ExplanationDraft;
    type Output = Explanation;

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Explanation
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn char_budget(&self) -> usize {
        self.char_budget
    }

    fn system_prompt(&self) -> String {
        "You explain code to learners. You are concise and you only state what the \
         provided excerpts show."
            .into()
    }

    fn render_prompt(&self, request: &GenerationRequest, contexts: &str) -> String {
        format!(
            "Repository: {repo}\nTarget: {target} (file: {file})\n\n\
             Return one JSON object with this shape:\n\
             {{\n  \
             \"summary\": \"one sentence, at most 140 chars\",\n  \
             \"key_points\": [\"point 1\", \"point 2\", \"point 3\"],\n  \
             \"unit_test\": {{\"title\": \"test name\", \"code\": \"one runnable assert or test\", \"language\": \"python\"}},\n  \
             \"example\": \"one-line usage example, or 'No simple example applicable.'\",\n  \
             \"sources\": [\"CONTEXT_ID\"],\n  \
             \"warnings\": []\n\
             }}\n\n\
             Exactly {KEY_POINTS} key points. List at least one CONTEXT_ID in sources.\n\
             If the contexts are not enough, set summary to \"Insufficient context to summarize {target}.\" and add a warning.\n\n\
             {GROUNDING_RULES}\n\n{contexts}",
            repo = request.repo_id,
            target = request.target,
            file = self.file_path,
            contexts = contexts_section(contexts),
        )
    }

    fn check_contract(&self, raw: &ExplanationDraft) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        if blank(&raw.summary) {
            violations.push("summary is empty".to_owned());
        }
        if raw.key_points.len() != KEY_POINTS {
            violations.push(format!(
                "expected {KEY_POINTS} key points, got {}",
                raw.key_points.len()
            ));
        }
        if raw.key_points.iter().any(|p| blank(p)) {
            violations.push("key point is empty".to_owned());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn validate_citations(&self, raw: &mut ExplanationDraft, check: &mut CitationCheck<'_>) {
        check.filter(&mut raw.sources, "sources");
    }

    fn finalize(&self, raw: ExplanationDraft, ctx: FinalizeContext<'_>) -> Explanation {
        let sources_full = ctx.resolve(&ctx.valid_ids);
        let mut warnings = raw.warnings;
        warnings.extend(ctx.warnings);
        Explanation {
            repo_id: ctx.request.repo_id.clone(),
            file_path: self.file_path.clone(),
            target: ctx.request.target.clone(),
            summary: raw.summary.trim().to_owned(),
            key_points: raw.key_points,
            unit_test: raw.unit_test,
            example: raw.example,
            sources: ctx.valid_ids,
            sources_full,
            confidence: ctx.confidence,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Selection;

    fn plugin() -> ExplanationPlugin {
        ExplanationPlugin::new("src/app.py", &GenerationConfig::default())
    }

    fn draft(key_points: usize) -> ExplanationDraft {
        serde_json::from_value(serde_json::json!({
            "summary": "Starts the app.",
            "key_points": vec!["p"; key_points],
            "unit_test": {"title": "t", "code": "assert start() == 0"},
            "sources": ["a"]
        }))
        .unwrap()
    }

    #[test]
    fn requires_three_key_points() {
        assert!(plugin().check_contract(&draft(3)).is_ok());
        let err = plugin().check_contract(&draft(2)).unwrap_err();
        assert_eq!(err, ["expected 3 key points, got 2"]);
    }

    #[test]
    fn unit_test_language_defaults() {
        assert_eq!(draft(3).unit_test.language, "python");
    }

    #[test]
    fn prompt_snapshot() {
        let request = GenerationRequest {
            repo_id: "acme/widgets".into(),
            target: "start".into(),
            goal: String::new(),
            selection: Selection::Preselected,
        };
        let prompt = plugin().render_prompt(&request, "CONTEXT_ID: a\nFILE: src/app.py\nEXCERPT:\ndef start(): ...\n---END CONTEXT");
        insta::assert_snapshot!(prompt, @r#"
        Repository: acme/widgets
        Target: start (file: src/app.py)

        Return one JSON object with this shape:
        {
          "summary": "one sentence, at most 140 chars",
          "key_points": ["point 1", "point 2", "point 3"],
          "unit_test": {"title": "test name", "code": "one runnable assert or test", "language": "python"},
          "example": "one-line usage example, or 'No simple example applicable.'",
          "sources": ["CONTEXT_ID"],
          "warnings": []
        }

        Exactly 3 key points. List at least one CONTEXT_ID in sources.
        If the contexts are not enough, set summary to "Insufficient context to summarize start." and add a warning.

        RULES:
        - Use only facts stated in the CONTEXTS. Never invent files, functions or behaviour.
        - Cite contexts only by the exact CONTEXT_ID strings shown.
        - If the contexts do not cover something, say so instead of guessing.
        - Reply with exactly one JSON object: start with { and end with }. No prose, no markdown.

        CONTEXTS:
        ---BEGIN
        CONTEXT_ID: a
        FILE: src/app.py
        EXCERPT:
        def start(): ...
        ---END CONTEXT
        ---END
        "#);
    }
}
