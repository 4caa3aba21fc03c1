//! Lesson nodes layered onto the file graph.

use std::collections::BTreeSet;

use reporover_index::graph::{Edge, EdgeKind, Graph, Node};

use crate::artifacts::{Lesson, LessonPlan};

#[must_use]
pub fn lesson_node_id(lesson: &Lesson) -> String {
    format!("lesson_{}", lesson.lesson_id)
}

/// Add one node per lesson, dashed `source` edges to the files it cites, and
/// `next` edges through the lesson sequence. Edges whose file is not in the
/// graph are dropped.
pub fn overlay_lessons(graph: &mut Graph, plan: &LessonPlan) {
    for lesson in &plan.lessons {
        let id = lesson_node_id(lesson);
        if graph.has_node(&id) {
            continue;
        }
        graph.nodes.push(Node {
            label: format!(
                "{}: {} ({}m)",
                lesson.lesson_id, lesson.title, lesson.duration_minutes
            ),
            group: format!("lesson_{}", lesson.level.as_str()),
            title: (!lesson.objective.is_empty()).then(|| lesson.objective.clone()),
            id,
        });
    }

    let mut dropped = 0usize;
    for lesson in &plan.lessons {
        let from = lesson_node_id(lesson);
        let files: BTreeSet<String> = lesson
            .cited_records()
            .into_iter()
            .map(|r| r.file_path)
            .collect();
        for file in files {
            let added = graph.push_edge(Edge {
                from: from.clone(),
                to: file,
                kind: EdgeKind::Source,
                label: None,
                dashes: true,
            });
            dropped += usize::from(!added);
        }
    }
    for pair in plan.lessons.windows(2) {
        graph.push_edge(Edge {
            from: lesson_node_id(&pair[0]),
            to: lesson_node_id(&pair[1]),
            kind: EdgeKind::Next,
            label: Some("next".into()),
            dashes: false,
        });
    }
    if dropped > 0 {
        tracing::debug!(dropped, "lesson source edges without a file node");
    }
}

#[cfg(test)]
mod tests {
    use reporover_index::graph::build_graph;

    use super::*;
    use crate::artifacts::fixtures::{code, doc};
    use crate::artifacts::{LessonStep, Level};
    use crate::engine::Confidence;

    fn lesson(id: &str, level: Level, cites: Vec<reporover_index::ContextRecord>) -> Lesson {
        Lesson {
            lesson_id: id.into(),
            title: format!("Lesson {id}"),
            level,
            objective: String::new(),
            duration_minutes: 7,
            steps: vec![LessonStep {
                order: 1,
                instruction: "read".into(),
                evidence: cites.iter().map(|r| r.id.clone()).collect(),
                evidence_full: cites.clone(),
            }],
            summary: String::new(),
            quiz_hint: String::new(),
            sources: Vec::new(),
            sources_full: cites,
        }
    }

    #[test]
    fn adds_lessons_sources_and_sequence() {
        let app = code("a", "src/app.py", "def start(): ...");
        let readme = doc("r", "README.md", "# Widgets");
        let ghost = code("g", "src/ghost.py", "x = 1");
        let mut graph = build_graph(&[app.clone(), readme.clone()], 40);
        let plan = LessonPlan {
            repo_id: "acme/widgets".into(),
            goal: "run it".into(),
            lessons: vec![
                lesson("L1", Level::Beginner, vec![readme, ghost]),
                lesson("L2", Level::Intermediate, vec![app]),
            ],
            sources: Vec::new(),
            confidence: Confidence::Medium,
            warnings: Vec::new(),
        };
        overlay_lessons(&mut graph, &plan);

        let l1 = graph.nodes.iter().find(|n| n.id == "lesson_L1").unwrap();
        assert_eq!(l1.label, "L1: Lesson L1 (7m)");
        assert_eq!(l1.group, "lesson_beginner");

        let sources: Vec<(&str, &str)> = graph
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Source)
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        assert_eq!(
            sources,
            [("lesson_L1", "README.md"), ("lesson_L2", "src/app.py")]
        );
        assert!(graph.edges.iter().all(|e| e.kind != EdgeKind::Source || e.dashes));
        assert!(
            graph
                .edges
                .iter()
                .any(|e| e.kind == EdgeKind::Next && e.from == "lesson_L1" && e.to == "lesson_L2")
        );
        assert!(graph.edges.iter().all(|e| graph.has_node(&e.from) && graph.has_node(&e.to)));
    }
}
