//! Deterministic scoring of multiple-choice responses.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::artifacts::{Question, Quiz};

static LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Da-d])(?:[.)]\s*(.*))?$").expect("labelled choice regex is valid")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub qid: String,
    pub question: String,
    pub user_choice: Option<String>,
    /// `"<label>. <text>"` of the correct choice.
    pub correct_choice: String,
    pub correct: bool,
    pub explanation: String,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    pub score: usize,
    pub total: usize,
    pub percent: f64,
    pub results: Vec<QuestionResult>,
}

/// A response either names a label (`"B"`, `"b)"`, `"B. text"`) or repeats
/// a choice text. When a label is present it decides the answer.
fn is_correct(question: &Question, response: &str) -> bool {
    let Some(correct) = question.correct_choice() else {
        return false;
    };
    let response = response.trim();
    if let Some(caps) = LABELLED.captures(response) {
        return caps[1].eq_ignore_ascii_case(correct.label.trim());
    }
    response.eq_ignore_ascii_case(correct.text.trim())
}

/// Score `responses` (keyed by qid). Unanswered questions count as wrong.
#[must_use]
pub fn grade_quiz(quiz: &Quiz, responses: &HashMap<String, String>) -> GradeReport {
    let results: Vec<QuestionResult> = quiz
        .questions
        .iter()
        .map(|q| {
            let user_choice = responses.get(&q.qid).cloned();
            let correct = user_choice.as_deref().is_some_and(|r| is_correct(q, r));
            QuestionResult {
                qid: q.qid.clone(),
                question: q.question.clone(),
                correct_choice: q
                    .correct_choice()
                    .map(|c| format!("{}. {}", c.label, c.text))
                    .unwrap_or_default(),
                user_choice,
                correct,
                explanation: q.explanation.clone(),
                evidence: q.evidence.clone(),
            }
        })
        .collect();
    let score = results.iter().filter(|r| r.correct).count();
    let total = results.len();
    #[allow(clippy::cast_precision_loss)]
    let percent = if total == 0 {
        0.0
    } else {
        score as f64 / total as f64 * 100.0
    };
    tracing::debug!(quiz = %quiz.quiz_id, score, total, "graded quiz");
    GradeReport {
        score,
        total,
        percent,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Choice;
    use crate::engine::Confidence;

    fn quiz() -> Quiz {
        let question = |qid: &str, correct: usize| Question {
            qid: qid.into(),
            question: format!("question {qid}"),
            choices: ["A", "B", "C", "D"]
                .iter()
                .enumerate()
                .map(|(i, l)| Choice {
                    label: (*l).into(),
                    text: format!("answer {i}"),
                    correct: i == correct,
                })
                .collect(),
            explanation: "because".into(),
            evidence: vec!["ctx".into()],
            evidence_full: Vec::new(),
        };
        Quiz {
            lesson_id: "L1".into(),
            quiz_id: "L1-quiz".into(),
            questions: vec![question("Q1", 0), question("Q2", 1), question("Q3", 2)],
            is_practice: false,
            sources: Vec::new(),
            confidence: Confidence::Medium,
            warnings: Vec::new(),
        }
    }

    fn responses(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn accepts_labelled_bare_label_and_text() {
        let report = grade_quiz(
            &quiz(),
            &responses(&[("Q1", "A. answer 0"), ("Q2", "b"), ("Q3", "Answer 2")]),
        );
        assert_eq!(report.score, 3);
        assert!((report.percent - 100.0).abs() < f64::EPSILON);
        assert_eq!(report.results[1].correct_choice, "B. answer 1");
    }

    #[test]
    fn label_wins_over_text() {
        let report = grade_quiz(&quiz(), &responses(&[("Q1", "B. answer 0")]));
        assert!(!report.results[0].correct);
    }

    #[test]
    fn unanswered_is_wrong() {
        let report = grade_quiz(&quiz(), &responses(&[("Q1", "A")]));
        assert_eq!(report.score, 1);
        assert_eq!(report.total, 3);
        assert!(report.results[2].user_choice.is_none());
        assert!(!report.results[2].correct);
    }

    #[test]
    fn empty_quiz_scores_zero() {
        let mut empty = quiz();
        empty.questions.clear();
        let report = grade_quiz(&empty, &HashMap::new());
        assert_eq!((report.score, report.total), (0, 0));
        assert!(report.percent.abs() < f64::EPSILON);
    }
}
