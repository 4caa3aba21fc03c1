//! Learning artifacts and the plugins that generate them.

pub mod explanation;
pub mod hint;
pub mod lesson;
pub mod quiz;

use serde::{Deserialize, Serialize};

pub use explanation::{Explanation, ExplanationPlugin, UnitTest};
pub use hint::{Hint, HintPlugin};
pub use lesson::{Lesson, LessonPlan, LessonPlugin, LessonStep, Level};
pub use quiz::{Choice, Question, Quiz, QuizPlugin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Explanation,
    Lessons,
    Quiz,
    PracticeQuiz,
    Hint,
}

impl ArtifactKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explanation => "explanation",
            Self::Lessons => "lessons",
            Self::Quiz => "quiz",
            Self::PracticeQuiz => "practice_quiz",
            Self::Hint => "hint",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any generated artifact, tagged by kind for storage and replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Explanation(Explanation),
    Lessons(LessonPlan),
    Quiz(Quiz),
    PracticeQuiz(Quiz),
    Hint(Hint),
}

impl Artifact {
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Explanation(_) => ArtifactKind::Explanation,
            Self::Lessons(_) => ArtifactKind::Lessons,
            Self::Quiz(_) => ArtifactKind::Quiz,
            Self::PracticeQuiz(_) => ArtifactKind::PracticeQuiz,
            Self::Hint(_) => ArtifactKind::Hint,
        }
    }

    #[must_use]
    pub fn into_quiz(self) -> Option<Quiz> {
        match self {
            Self::Quiz(q) | Self::PracticeQuiz(q) => Some(q),
            _ => None,
        }
    }
}

impl From<Quiz> for Artifact {
    fn from(quiz: Quiz) -> Self {
        if quiz.is_practice {
            Self::PracticeQuiz(quiz)
        } else {
            Self::Quiz(quiz)
        }
    }
}

/// Grounding rules shared by every artifact prompt.
pub(crate) const GROUNDING_RULES: &str = "\
RULES:
- Use only facts stated in the CONTEXTS. Never invent files, functions or behaviour.
- Cite contexts only by the exact CONTEXT_ID strings shown.
- If the contexts do not cover something, say so instead of guessing.
- Reply with exactly one JSON object: start with { and end with }. No prose, no markdown.";

pub(crate) fn contexts_section(contexts: &str) -> String {
    format!("CONTEXTS:\n---BEGIN\n{contexts}\n---END")
}

pub(crate) fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use reporover_index::ContextRecord;
    use reporover_index::languages::Lang;
    use reporover_index::record::{FileSource, RecordKind};

    pub fn code(id: &str, path: &str, body: &str) -> ContextRecord {
        let source = FileSource {
            repo_id: "acme/widgets",
            path,
            lang: Lang::Python,
            priority: 3,
        };
        ContextRecord::new(&source, id.into(), RecordKind::Function, body.into()).with_lines(1, 3)
    }

    pub fn doc(id: &str, path: &str, body: &str) -> ContextRecord {
        let source = FileSource {
            repo_id: "acme/widgets",
            path,
            lang: Lang::Markdown,
            priority: 0,
        };
        ContextRecord::new(&source, id.into(), RecordKind::Section, body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Confidence;

    #[test]
    fn quiz_variant_follows_practice_flag() {
        let quiz = Quiz {
            lesson_id: "L1".into(),
            quiz_id: "L1-practice".into(),
            questions: Vec::new(),
            is_practice: true,
            sources: Vec::new(),
            confidence: Confidence::Low,
            warnings: Vec::new(),
        };
        let artifact = Artifact::from(quiz);
        assert_eq!(artifact.kind(), ArtifactKind::PracticeQuiz);
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["type"], "practice_quiz");
        let back: Artifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, artifact);
    }
}
