use reporover_index::ContextRecord;
use serde::{Deserialize, Serialize};

use super::{ArtifactKind, GROUNDING_RULES, Question, blank, contexts_section};
use crate::config::GenerationConfig;
use crate::engine::{
    ArtifactPlugin, CitationCheck, Confidence, FinalizeContext, GenerationRequest,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    pub qid: String,
    pub hint: String,
    pub explanation: String,
    pub sources: Vec<String>,
    pub sources_full: Vec<ContextRecord>,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct HintDraft {
    pub hint: String,
    pub explanation: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Nudge toward the right answer of a missed question without giving it away.
#[derive(Debug, Clone)]
pub struct HintPlugin {
    pub question: Question,
    pub char_budget: usize,
    pub temperature: f32,
}

impl HintPlugin {
    #[must_use]
    pub fn new(question: Question, config: &GenerationConfig) -> Self {
        Self {
            question,
            char_budget: config.hint_budget,
            temperature: config.hint_temperature,
        }
    }

    fn correct_text(&self) -> &str {
        self.question
            .correct_choice()
            .map_or("", |c| c.text.trim())
    }
}

impl ArtifactPlugin for HintPlugin {
    type Raw = HintDraft;
    type Output = Hint;

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Hint
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn char_budget(&self) -> usize {
        self.char_budget
    }

    fn system_prompt(&self) -> String {
        "You are a friendly tutor. A learner missed a multiple-choice question; \
         help them find the answer themselves."
            .into()
    }

    fn render_prompt(&self, _request: &GenerationRequest, contexts: &str) -> String {
        format!(
            "Question: {question}\nCorrect answer: {answer}\n\n\
             Return one JSON object with this shape:\n\
             {{\n  \
             \"hint\": \"one sentence that points at the relevant concept without revealing the answer\",\n  \
             \"explanation\": \"two or three sentences on why the correct answer is right, citing CONTEXT_IDs\",\n  \
             \"sources\": [\"CONTEXT_ID\"]\n\
             }}\n\n\
             The hint must not contain the correct answer text or its letter.\n\n\
             {GROUNDING_RULES}\n\n{contexts}",
            question = self.question.question,
            answer = self.correct_text(),
            contexts = contexts_section(contexts),
        )
    }

    fn check_contract(&self, raw: &HintDraft) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        if blank(&raw.hint) {
            violations.push("hint is empty".to_owned());
        }
        if blank(&raw.explanation) {
            violations.push("explanation is empty".to_owned());
        }
        let answer = self.correct_text().to_lowercase();
        if !answer.is_empty() && raw.hint.to_lowercase().contains(&answer) {
            violations.push("hint reveals the correct answer".to_owned());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn validate_citations(&self, raw: &mut HintDraft, check: &mut CitationCheck<'_>) {
        check.filter(&mut raw.sources, "sources");
    }

    fn finalize(&self, raw: HintDraft, ctx: FinalizeContext<'_>) -> Hint {
        Hint {
            qid: self.question.qid.clone(),
            hint: raw.hint.trim().to_owned(),
            explanation: raw.explanation.trim().to_owned(),
            sources_full: ctx.resolve(&ctx.valid_ids),
            sources: ctx.valid_ids,
            confidence: ctx.confidence,
            warnings: ctx.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Choice;

    fn question() -> Question {
        let choice = |label: &str, text: &str, correct| Choice {
            label: label.into(),
            text: text.into(),
            correct,
        };
        Question {
            qid: "Q2".into(),
            question: "Which function starts the server?".into(),
            choices: vec![
                choice("A", "main", false),
                choice("B", "start_server", true),
                choice("C", "run_tests", false),
                choice("D", "setup", false),
            ],
            explanation: String::new(),
            evidence: Vec::new(),
            evidence_full: Vec::new(),
        }
    }

    fn draft(hint: &str) -> HintDraft {
        HintDraft {
            hint: hint.into(),
            explanation: "See the entry point.".into(),
            sources: vec!["a".into()],
        }
    }

    #[test]
    fn spoiler_is_a_violation() {
        let plugin = HintPlugin::new(question(), &GenerationConfig::default());
        assert!(plugin.check_contract(&draft("Look at what app.py calls first.")).is_ok());
        let err = plugin
            .check_contract(&draft("It is START_SERVER, obviously."))
            .unwrap_err();
        assert_eq!(err, ["hint reveals the correct answer"]);
    }

    #[test]
    fn prompt_names_correct_answer() {
        let plugin = HintPlugin::new(question(), &GenerationConfig::default());
        let request = GenerationRequest {
            repo_id: "acme/widgets".into(),
            target: "Q2".into(),
            goal: String::new(),
            selection: crate::engine::Selection::Preselected,
        };
        let prompt = plugin.render_prompt(&request, "");
        assert!(prompt.starts_with("Question: Which function starts the server?\nCorrect answer: start_server\n"));
        assert!((plugin.temperature() - 0.25).abs() < f32::EPSILON);
    }
}
