use std::collections::HashSet;

use reporover_index::ContextRecord;
use serde::{Deserialize, Serialize};

use super::{ArtifactKind, GROUNDING_RULES, blank, contexts_section};
use crate::config::GenerationConfig;
use crate::engine::{
    ArtifactPlugin, CitationCheck, Confidence, FinalizeContext, GenerationRequest,
};

const MAX_INSTRUCTION_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl TryFrom<String> for Level {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown lesson level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonStep {
    pub order: u32,
    pub instruction: String,
    pub evidence: Vec<String>,
    #[serde(default)]
    pub evidence_full: Vec<ContextRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_id: String,
    pub title: String,
    pub level: Level,
    pub objective: String,
    pub duration_minutes: u32,
    pub steps: Vec<LessonStep>,
    pub summary: String,
    pub quiz_hint: String,
    pub sources: Vec<String>,
    #[serde(default)]
    pub sources_full: Vec<ContextRecord>,
}

impl Lesson {
    /// Resolved sources and step evidence, deduplicated by id, sources first.
    #[must_use]
    pub fn cited_records(&self) -> Vec<ContextRecord> {
        let mut seen = HashSet::new();
        self.sources_full
            .iter()
            .chain(self.steps.iter().flat_map(|s| s.evidence_full.iter()))
            .filter(|r| seen.insert(r.id.clone()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonPlan {
    pub repo_id: String,
    pub goal: String,
    pub lessons: Vec<Lesson>,
    pub sources: Vec<String>,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

impl LessonPlan {
    #[must_use]
    pub fn lesson(&self, lesson_id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_id == lesson_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct StepDraft {
    pub order: u32,
    pub instruction: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LessonDraft {
    pub lesson_id: String,
    pub title: String,
    pub level: Level,
    #[serde(default)]
    pub objective: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    pub steps: Vec<StepDraft>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub quiz_hint: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

fn default_duration() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
pub struct LessonPlanDraft {
    pub lessons: Vec<LessonDraft>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A short sequence of lessons toward a learning goal.
#[derive(Debug, Clone)]
pub struct LessonPlugin {
    pub lesson_count: usize,
    pub char_budget: usize,
    pub temperature: f32,
}

impl LessonPlugin {
    #[must_use]
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            lesson_count: config.lesson_count,
            char_budget: config.lesson_budget,
            temperature: config.lesson_temperature,
        }
    }
}

impl ArtifactPlugin for LessonPlugin {
    type Raw = LessonPlanDraft;
    type Output = LessonPlan;

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Lessons
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn char_budget(&self) -> usize {
        self.char_budget
    }

    fn system_prompt(&self) -> String {
        "You are a patient tutor who turns a software repository into short, \
         practical lessons for newcomers."
            .into()
    }

    fn render_prompt(&self, request: &GenerationRequest, contexts: &str) -> String {
        format!(
            "Repository: {repo}\nLearner goal: {goal}\n\n\
             Write {count} lessons that move the learner toward the goal, easiest first.\n\
             Return one JSON object with this shape:\n\
             {{\n  \
             \"lessons\": [\n    {{\n      \
             \"lesson_id\": \"L1\",\n      \
             \"title\": \"short title\",\n      \
             \"level\": \"beginner | intermediate | advanced\",\n      \
             \"objective\": \"one learning goal\",\n      \
             \"duration_minutes\": 5,\n      \
             \"steps\": [{{\"order\": 1, \"instruction\": \"at most {MAX_INSTRUCTION_CHARS} chars\", \"evidence\": [\"CONTEXT_ID\"]}}],\n      \
             \"summary\": \"what was learned\",\n      \
             \"quiz_hint\": \"what a quiz should check\",\n      \
             \"sources\": [\"CONTEXT_ID\"]\n    \
             }}\n  ],\n  \
             \"warnings\": []\n\
             }}\n\n\
             Every step needs evidence and every lesson needs sources.\n\n\
             {GROUNDING_RULES}\n\n{contexts}",
            repo = request.repo_id,
            goal = request.goal,
            count = self.lesson_count,
            contexts = contexts_section(contexts),
        )
    }

    fn check_contract(&self, raw: &LessonPlanDraft) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        if raw.lessons.is_empty() {
            violations.push("no lessons returned".to_owned());
        }
        let mut ids = HashSet::new();
        for (i, lesson) in raw.lessons.iter().enumerate() {
            let label = if blank(&lesson.lesson_id) {
                violations.push(format!("lesson {} has no lesson_id", i + 1));
                format!("lesson {}", i + 1)
            } else {
                if !ids.insert(lesson.lesson_id.trim()) {
                    violations.push(format!("duplicate lesson_id '{}'", lesson.lesson_id));
                }
                lesson.lesson_id.clone()
            };
            if blank(&lesson.title) {
                violations.push(format!("{label}: title is empty"));
            }
            if lesson.steps.is_empty() {
                violations.push(format!("{label}: no steps"));
            }
            if lesson.steps.iter().any(|s| blank(&s.instruction)) {
                violations.push(format!("{label}: step instruction is empty"));
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn validate_citations(&self, raw: &mut LessonPlanDraft, check: &mut CitationCheck<'_>) {
        if raw.lessons.len() != self.lesson_count {
            check.warn(format!(
                "generated {} lessons instead of {}",
                raw.lessons.len(),
                self.lesson_count
            ));
        }
        for lesson in &mut raw.lessons {
            let id = lesson.lesson_id.trim().to_owned();
            check.filter(&mut lesson.sources, &format!("{id} sources"));
            if lesson.sources.is_empty() {
                check.warn(format!("{id}: no valid sources"));
            }
            for step in &mut lesson.steps {
                check.filter(&mut step.evidence, &format!("{id} step {} evidence", step.order));
                if step.evidence.is_empty() {
                    check.warn(format!("{id} step {}: missing evidence", step.order));
                }
                let chars = step.instruction.chars().count();
                if chars > MAX_INSTRUCTION_CHARS {
                    check.warn(format!(
                        "{id} step {}: instruction too long ({chars} chars)",
                        step.order
                    ));
                }
            }
        }
    }

    fn finalize(&self, raw: LessonPlanDraft, ctx: FinalizeContext<'_>) -> LessonPlan {
        let lessons = raw
            .lessons
            .into_iter()
            .map(|draft| {
                let mut steps: Vec<LessonStep> = draft
                    .steps
                    .into_iter()
                    .map(|s| LessonStep {
                        evidence_full: ctx.resolve(&s.evidence),
                        order: s.order,
                        instruction: s.instruction.trim().to_owned(),
                        evidence: s.evidence,
                    })
                    .collect();
                steps.sort_by_key(|s| s.order);
                Lesson {
                    sources_full: ctx.resolve(&draft.sources),
                    lesson_id: draft.lesson_id.trim().to_owned(),
                    title: draft.title.trim().to_owned(),
                    level: draft.level,
                    objective: draft.objective,
                    duration_minutes: draft.duration_minutes,
                    steps,
                    summary: draft.summary,
                    quiz_hint: draft.quiz_hint,
                    sources: draft.sources,
                }
            })
            .collect();
        let mut warnings = raw.warnings;
        warnings.extend(ctx.warnings);
        LessonPlan {
            repo_id: ctx.request.repo_id.clone(),
            goal: ctx.request.goal.clone(),
            lessons,
            sources: ctx.valid_ids,
            confidence: ctx.confidence,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(json: serde_json::Value) -> LessonPlanDraft {
        serde_json::from_value(json).unwrap()
    }

    fn lesson(id: &str, sources: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "lesson_id": id,
            "title": "Run the app",
            "level": "Beginner",
            "steps": [{"order": 1, "instruction": "Read start()", "evidence": sources}],
            "sources": sources
        })
    }

    #[test]
    fn level_is_case_insensitive() {
        assert_eq!(Level::try_from("Advanced".to_owned()), Ok(Level::Advanced));
        assert!(Level::try_from("expert".to_owned()).is_err());
        assert_eq!(serde_json::to_string(&Level::Beginner).unwrap(), "\"beginner\"");
    }

    #[test]
    fn duplicate_ids_violate_contract() {
        let plugin = LessonPlugin::new(&GenerationConfig::default());
        let raw = draft(serde_json::json!({"lessons": [lesson("L1", &["a"]), lesson("L1", &["a"])]}));
        let err = plugin.check_contract(&raw).unwrap_err();
        assert_eq!(err, ["duplicate lesson_id 'L1'"]);
    }

    #[test]
    fn empty_plan_violates_contract() {
        let plugin = LessonPlugin::new(&GenerationConfig::default());
        assert!(plugin.check_contract(&draft(serde_json::json!({"lessons": []}))).is_err());
    }

    #[test]
    fn count_mismatch_and_bad_evidence_only_warn() {
        let plugin = LessonPlugin::new(&GenerationConfig::default());
        let mut raw = draft(serde_json::json!({"lessons": [lesson("L1", &["a", "ghost"])]}));
        assert!(plugin.check_contract(&raw).is_ok());

        let included = vec!["a".to_owned()];
        let mut check = CitationCheck::new(&included);
        plugin.validate_citations(&mut raw, &mut check);
        let (valid, warnings) = check.finish();
        assert_eq!(valid, ["a"]);
        assert_eq!(raw.lessons[0].steps[0].evidence, ["a"]);
        assert!(warnings.contains(&"generated 1 lessons instead of 3".to_owned()));
        assert!(warnings.iter().any(|w| w.contains("'ghost'")));
    }

    #[test]
    fn model_supplied_full_records_are_ignored() {
        let mut value = lesson("L1", &["a"]);
        value["sources_full"] = serde_json::json!([{"bogus": true}]);
        let raw = draft(serde_json::json!({"lessons": [value]}));
        assert_eq!(raw.lessons[0].sources, ["a"]);
    }
}
