use std::collections::HashSet;

use reporover_index::ContextRecord;
use serde::{Deserialize, Serialize};

use super::{ArtifactKind, GROUNDING_RULES, Lesson, blank, contexts_section};
use crate::config::GenerationConfig;
use crate::engine::{
    ArtifactPlugin, CitationCheck, Confidence, FinalizeContext, GenerationRequest,
};

pub const LABELS: [&str; 4] = ["A", "B", "C", "D"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub text: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub qid: String,
    pub question: String,
    pub choices: Vec<Choice>,
    pub explanation: String,
    pub evidence: Vec<String>,
    #[serde(default)]
    pub evidence_full: Vec<ContextRecord>,
}

impl Question {
    #[must_use]
    pub fn correct_choice(&self) -> Option<&Choice> {
        self.choices.iter().find(|c| c.correct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub lesson_id: String,
    pub quiz_id: String,
    pub questions: Vec<Question>,
    pub is_practice: bool,
    pub sources: Vec<String>,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

impl Quiz {
    #[must_use]
    pub fn question(&self, qid: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.qid == qid)
    }
}

#[derive(Debug, Deserialize)]
pub struct QuestionDraft {
    pub question: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuizDraft {
    pub questions: Vec<QuestionDraft>,
}

/// Multiple-choice questions about one lesson.
///
/// A practice quiz is a single question, used when the lesson cites too
/// little material for a full quiz.
#[derive(Debug, Clone)]
pub struct QuizPlugin {
    pub lesson_id: String,
    pub lesson_title: String,
    pub objective: String,
    pub questions: usize,
    pub practice: bool,
    pub char_budget: usize,
    pub temperature: f32,
}

impl QuizPlugin {
    #[must_use]
    pub fn for_lesson(lesson: &Lesson, config: &GenerationConfig) -> Self {
        Self {
            lesson_id: lesson.lesson_id.clone(),
            lesson_title: lesson.title.clone(),
            objective: lesson.objective.clone(),
            questions: config.quiz_questions,
            practice: false,
            char_budget: config.quiz_budget,
            temperature: config.quiz_temperature,
        }
    }

    #[must_use]
    pub fn practice(lesson: &Lesson, config: &GenerationConfig) -> Self {
        Self {
            questions: 1,
            practice: true,
            ..Self::for_lesson(lesson, config)
        }
    }

    fn check_question(&self, n: usize, q: &QuestionDraft, violations: &mut Vec<String>) {
        let qid = format!("Q{n}");
        if blank(&q.question) {
            violations.push(format!("{qid}: question text is empty"));
        }
        if q.choices.len() != LABELS.len() {
            violations.push(format!(
                "{qid}: expected {} choices, got {}",
                LABELS.len(),
                q.choices.len()
            ));
            return;
        }
        let labels: Vec<String> = q
            .choices
            .iter()
            .map(|c| c.label.trim().trim_end_matches(['.', ')']).to_ascii_uppercase())
            .collect();
        if labels != LABELS {
            violations.push(format!("{qid}: choices must be labelled A-D in order"));
        }
        let correct = q.choices.iter().filter(|c| c.correct).count();
        if correct != 1 {
            violations.push(format!("{qid}: expected exactly one correct choice, got {correct}"));
        }
        if q.choices.iter().any(|c| blank(&c.text)) {
            violations.push(format!("{qid}: choice text is empty"));
        }
        let distinct: HashSet<&str> = q.choices.iter().map(|c| c.text.trim()).collect();
        if distinct.len() != q.choices.len() {
            violations.push(format!("{qid}: choice texts must be distinct"));
        }
    }
}

impl ArtifactPlugin for QuizPlugin {
    type Raw = QuizDraft;
    type Output = Quiz;

    fn kind(&self) -> ArtifactKind {
        if self.practice {
            ArtifactKind::PracticeQuiz
        } else {
            ArtifactKind::Quiz
        }
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn char_budget(&self) -> usize {
        self.char_budget
    }

    fn system_prompt(&self) -> String {
        "You write fair multiple-choice questions that check understanding of a lesson.".into()
    }

    fn render_prompt(&self, request: &GenerationRequest, contexts: &str) -> String {
        format!(
            "Repository: {repo}\nLesson {id}: {title}\nObjective: {objective}\n\n\
             Write exactly {n} multiple-choice question(s) answerable from the contexts.\n\
             Return one JSON object with this shape:\n\
             {{\n  \
             \"questions\": [\n    {{\n      \
             \"question\": \"question text\",\n      \
             \"choices\": [\n        \
             {{\"label\": \"A\", \"text\": \"...\", \"correct\": false}},\n        \
             {{\"label\": \"B\", \"text\": \"...\", \"correct\": true}},\n        \
             {{\"label\": \"C\", \"text\": \"...\", \"correct\": false}},\n        \
             {{\"label\": \"D\", \"text\": \"...\", \"correct\": false}}\n      \
             ],\n      \
             \"explanation\": \"why the correct choice is right\",\n      \
             \"evidence\": [\"CONTEXT_ID\"]\n    \
             }}\n  ]\n\
             }}\n\n\
             Each question has four distinct choices labelled A to D and exactly one is correct.\n\n\
             {GROUNDING_RULES}\n\n{contexts}",
            repo = request.repo_id,
            id = self.lesson_id,
            title = self.lesson_title,
            objective = self.objective,
            n = self.questions,
            contexts = contexts_section(contexts),
        )
    }

    fn check_contract(&self, raw: &QuizDraft) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        if raw.questions.len() != self.questions {
            violations.push(format!(
                "expected {} question(s), got {}",
                self.questions,
                raw.questions.len()
            ));
        }
        for (i, q) in raw.questions.iter().enumerate() {
            self.check_question(i + 1, q, &mut violations);
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn validate_citations(&self, raw: &mut QuizDraft, check: &mut CitationCheck<'_>) {
        for (i, q) in raw.questions.iter_mut().enumerate() {
            check.filter(&mut q.evidence, &format!("Q{} evidence", i + 1));
        }
    }

    fn finalize(&self, raw: QuizDraft, ctx: FinalizeContext<'_>) -> Quiz {
        let questions = raw
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| Question {
                qid: format!("Q{}", i + 1),
                question: q.question.trim().to_owned(),
                choices: q
                    .choices
                    .into_iter()
                    .zip(LABELS)
                    .map(|(c, label)| Choice {
                        label: label.to_owned(),
                        text: c.text.trim().to_owned(),
                        correct: c.correct,
                    })
                    .collect(),
                explanation: q.explanation,
                evidence_full: ctx.resolve(&q.evidence),
                evidence: q.evidence,
            })
            .collect();
        let suffix = if self.practice { "practice" } else { "quiz" };
        Quiz {
            lesson_id: self.lesson_id.clone(),
            quiz_id: format!("{}-{suffix}", self.lesson_id),
            questions,
            is_practice: self.practice,
            sources: ctx.valid_ids,
            confidence: ctx.confidence,
            warnings: ctx.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Level;

    fn lesson() -> Lesson {
        Lesson {
            lesson_id: "L1".into(),
            title: "Run the app".into(),
            level: Level::Beginner,
            objective: "Start the server".into(),
            duration_minutes: 5,
            steps: Vec::new(),
            summary: String::new(),
            quiz_hint: String::new(),
            sources: Vec::new(),
            sources_full: Vec::new(),
        }
    }

    fn question(labels: [&str; 4], correct: [bool; 4]) -> serde_json::Value {
        let choices: Vec<_> = labels
            .iter()
            .zip(correct)
            .enumerate()
            .map(|(i, (l, c))| serde_json::json!({"label": l, "text": format!("option {i}"), "correct": c}))
            .collect();
        serde_json::json!({"question": "What starts the app?", "choices": choices, "evidence": ["a"]})
    }

    fn draft(questions: Vec<serde_json::Value>) -> QuizDraft {
        serde_json::from_value(serde_json::json!({ "questions": questions })).unwrap()
    }

    const ABCD: [&str; 4] = ["A", "B", "C", "D"];

    #[test]
    fn valid_quiz_passes() {
        let plugin = QuizPlugin::for_lesson(&lesson(), &GenerationConfig::default());
        let q = question(ABCD, [false, true, false, false]);
        assert!(plugin.check_contract(&draft(vec![q.clone(), q.clone(), q])).is_ok());
    }

    #[test]
    fn two_correct_choices_rejected() {
        let plugin = QuizPlugin::practice(&lesson(), &GenerationConfig::default());
        let err = plugin
            .check_contract(&draft(vec![question(ABCD, [true, true, false, false])]))
            .unwrap_err();
        assert_eq!(err, ["Q1: expected exactly one correct choice, got 2"]);
    }

    #[test]
    fn wrong_count_rejected() {
        let plugin = QuizPlugin::for_lesson(&lesson(), &GenerationConfig::default());
        let err = plugin
            .check_contract(&draft(vec![question(ABCD, [true, false, false, false])]))
            .unwrap_err();
        assert_eq!(err, ["expected 3 question(s), got 1"]);
    }

    #[test]
    fn labels_tolerate_punctuation_but_not_gaps() {
        let plugin = QuizPlugin::practice(&lesson(), &GenerationConfig::default());
        let ok = question(["a.", "B)", " c", "D"], [true, false, false, false]);
        assert!(plugin.check_contract(&draft(vec![ok])).is_ok());
        let bad = question(["A", "B", "C", "E"], [true, false, false, false]);
        assert!(plugin.check_contract(&draft(vec![bad])).is_err());
    }

    #[test]
    fn three_choices_rejected() {
        let plugin = QuizPlugin::practice(&lesson(), &GenerationConfig::default());
        let raw: QuizDraft = serde_json::from_value(serde_json::json!({"questions": [{
            "question": "q",
            "choices": [
                {"label": "A", "text": "x", "correct": true},
                {"label": "B", "text": "y", "correct": false},
                {"label": "C", "text": "z", "correct": false}
            ]
        }]}))
        .unwrap();
        assert_eq!(
            plugin.check_contract(&raw).unwrap_err(),
            ["Q1: expected 4 choices, got 3"]
        );
    }

    #[test]
    fn practice_kind_and_id() {
        let plugin = QuizPlugin::practice(&lesson(), &GenerationConfig::default());
        assert_eq!(plugin.kind(), ArtifactKind::PracticeQuiz);
        assert_eq!(plugin.questions, 1);
    }
}
