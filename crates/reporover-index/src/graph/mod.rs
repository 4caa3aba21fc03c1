//! File-level dependency graph built from the corpus.

mod imports;
pub mod mermaid;
mod resolve;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::languages::Lang;
use crate::record::ContextRecord;

pub use imports::{PyImport, js_imports, python_imports};
pub use mermaid::to_mermaid;

const TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// File path, or `lesson_<id>` for overlay nodes.
    pub id: String,
    pub label: String,
    /// Language for files, `lesson_<level>` for lessons.
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Import,
    Source,
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub dashes: bool,
}

impl Edge {
    #[must_use]
    pub fn import(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind: EdgeKind::Import,
            label: None,
            dashes: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    #[must_use]
    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Add an edge if both endpoints exist, it is not a self-edge, and the
    /// `(from, to, kind)` triple is new. Returns whether it was added.
    pub fn push_edge(&mut self, edge: Edge) -> bool {
        if edge.from == edge.to || !self.has_node(&edge.from) || !self.has_node(&edge.to) {
            return false;
        }
        if self
            .edges
            .iter()
            .any(|e| e.from == edge.from && e.to == edge.to && e.kind == edge.kind)
        {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Drop every edge whose endpoints are not both emitted nodes.
    pub fn prune_dangling(&mut self) {
        let ids: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        let before = self.edges.len();
        self.edges
            .retain(|e| ids.contains(&e.from) && ids.contains(&e.to));
        let dropped = before - self.edges.len();
        if dropped > 0 {
            tracing::debug!(dropped, "pruned dangling edges");
        }
    }
}

struct FileSummary<'a> {
    path: &'a str,
    language: Lang,
    records: Vec<&'a ContextRecord>,
    excerpt_chars: usize,
}

/// Build the import graph over the `max_files` most substantial files.
///
/// Files are ranked by record count, then total excerpt length, then path.
#[must_use]
pub fn build_graph(records: &[ContextRecord], max_files: usize) -> Graph {
    let mut by_file: BTreeMap<&str, FileSummary<'_>> = BTreeMap::new();
    for record in records {
        let entry = by_file
            .entry(record.file_path.as_str())
            .or_insert_with(|| FileSummary {
                path: &record.file_path,
                language: record.language,
                records: Vec::new(),
                excerpt_chars: 0,
            });
        entry.records.push(record);
        entry.excerpt_chars += record.excerpt.chars().count();
    }

    let mut files: Vec<FileSummary<'_>> = by_file.into_values().collect();
    files.sort_by(|a, b| {
        b.records
            .len()
            .cmp(&a.records.len())
            .then_with(|| b.excerpt_chars.cmp(&a.excerpt_chars))
            .then_with(|| a.path.cmp(b.path))
    });
    files.truncate(max_files);

    let mut graph = Graph {
        nodes: files.iter().map(file_node).collect(),
        edges: Vec::new(),
    };
    let kept: Vec<&str> = files.iter().map(|f| f.path).collect();

    for file in &files {
        let targets = match file.language {
            Lang::Python => file
                .records
                .iter()
                .flat_map(|r| python_imports(&r.content))
                .flat_map(|import| resolve::python_targets(file.path, &import, &kept))
                .collect::<Vec<_>>(),
            Lang::JavaScript | Lang::TypeScript => file
                .records
                .iter()
                .flat_map(|r| js_imports(&r.content))
                .flat_map(|spec| resolve::script_targets(file.path, &spec, &kept))
                .collect(),
            Lang::Markdown | Lang::Text => Vec::new(),
        };
        for target in targets {
            graph.push_edge(Edge::import(file.path, target));
        }
    }

    tracing::info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "graph built"
    );
    graph
}

fn file_node(file: &FileSummary<'_>) -> Node {
    let label = file.path.rsplit('/').next().unwrap_or(file.path).to_owned();
    let title = file.records.first().map(|r| match r.excerpt.char_indices().nth(TITLE_CHARS) {
        Some((idx, _)) => r.excerpt[..idx].to_owned(),
        None => r.excerpt.clone(),
    });
    Node {
        id: file.path.to_owned(),
        label,
        group: file.language.id().to_owned(),
        title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FileSource, RecordKind};

    fn rec(path: &'static str, lang: Lang, locator: &str, content: &str) -> ContextRecord {
        let source = FileSource {
            repo_id: "acme/widgets",
            path,
            lang,
            priority: 3,
        };
        ContextRecord::new(&source, source.record_id(locator), RecordKind::Function, content.into())
    }

    #[test]
    fn python_import_edge() {
        let records = vec![
            rec("main.py", Lang::Python, "run:1", "def run():\n    import utils\n    return utils.go()\n"),
            rec("utils.py", Lang::Python, "go:1", "def go():\n    return 1\n"),
        ];
        let graph = build_graph(&records, 40);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges, vec![Edge::import("main.py", "utils.py")]);
        let main = graph.nodes.iter().find(|n| n.id == "main.py").unwrap();
        assert_eq!(main.label, "main.py");
        assert_eq!(main.group, "python");
    }

    #[test]
    fn relative_js_import_resolves_extension() {
        let records = vec![
            rec("web/app.js", Lang::JavaScript, "0", "import { api } from './api';\n"),
            rec("web/api.ts", Lang::TypeScript, "0", "export const api = 1;\n"),
        ];
        let graph = build_graph(&records, 40);
        assert_eq!(graph.edges, vec![Edge::import("web/app.js", "web/api.ts")]);
    }

    #[test]
    fn unresolved_imports_produce_no_edges() {
        let records = vec![rec(
            "main.py",
            Lang::Python,
            "run:1",
            "def run():\n    import requests\n",
        )];
        let graph = build_graph(&records, 40);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn max_files_keeps_richest_files() {
        let records = vec![
            rec("a.py", Lang::Python, "x:1", "def x(): pass"),
            rec("b.py", Lang::Python, "y:1", "def y(): pass"),
            rec("b.py", Lang::Python, "z:3", "def z(): pass"),
            rec("c.md", Lang::Markdown, "section:0", "Intro\n\nlong text here"),
        ];
        let graph = build_graph(&records, 2);
        let ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["b.py", "c.md"]);
    }

    #[test]
    fn edges_to_dropped_files_are_not_emitted() {
        let records = vec![
            rec("main.py", Lang::Python, "a:1", "def a():\n    import utils\n"),
            rec("main.py", Lang::Python, "b:5", "def b(): pass"),
            rec("utils.py", Lang::Python, "go:1", "def go(): pass"),
        ];
        let graph = build_graph(&records, 1);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn push_edge_rejects_dangling_self_and_duplicate() {
        let mut graph = Graph {
            nodes: vec![
                Node { id: "a".into(), label: "a".into(), group: "python".into(), title: None },
                Node { id: "b".into(), label: "b".into(), group: "python".into(), title: None },
            ],
            edges: Vec::new(),
        };
        assert!(graph.push_edge(Edge::import("a", "b")));
        assert!(!graph.push_edge(Edge::import("a", "b")));
        assert!(!graph.push_edge(Edge::import("a", "a")));
        assert!(!graph.push_edge(Edge::import("a", "missing")));
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn prune_dangling_removes_orphans() {
        let mut graph = Graph {
            nodes: vec![Node { id: "a".into(), label: "a".into(), group: "text".into(), title: None }],
            edges: vec![Edge::import("a", "gone")],
        };
        graph.prune_dangling();
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn graph_json_shape() {
        let graph = Graph {
            nodes: vec![Node { id: "a".into(), label: "a".into(), group: "text".into(), title: None }],
            edges: Vec::new(),
        };
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["nodes"][0]["group"], "text");
        assert!(json["nodes"][0].get("title").is_none());
    }
}
