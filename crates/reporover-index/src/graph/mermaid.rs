//! Mermaid `flowchart` export.

use std::collections::HashMap;
use std::fmt::Write;

use super::{EdgeKind, Graph};

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Render `graph` as a left-to-right flowchart. Edges whose endpoints are
/// not nodes are skipped.
#[must_use]
pub fn to_mermaid(graph: &Graph) -> String {
    let mut out = String::from("flowchart LR\n");
    let mut ids: HashMap<&str, String> = HashMap::with_capacity(graph.nodes.len());

    for (i, node) in graph.nodes.iter().enumerate() {
        let safe = format!("n{i}_{}", sanitize(&node.id));
        let label = node.label.replace('"', "#quot;");
        let _ = writeln!(out, "  {safe}[\"{label}\"]");
        ids.insert(node.id.as_str(), safe);
    }

    for edge in &graph.edges {
        let (Some(from), Some(to)) = (ids.get(edge.from.as_str()), ids.get(edge.to.as_str())) else {
            continue;
        };
        let arrow = match (edge.kind, edge.dashes) {
            (EdgeKind::Next, _) => "==>",
            (_, true) => "-.->",
            (_, false) => "-->",
        };
        match &edge.label {
            Some(label) => {
                let _ = writeln!(out, "  {from} {arrow}|{label}| {to}");
            }
            None => {
                let _ = writeln!(out, "  {from} {arrow} {to}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::graph::{Edge, Node};

    fn node(id: &str, label: &str) -> Node {
        Node {
            id: id.into(),
            label: label.into(),
            group: "python".into(),
            title: None,
        }
    }

    #[test]
    fn renders_nodes_and_edges() {
        let graph = Graph {
            nodes: vec![
                node("src/app.py", "app.py"),
                node("src/utils.py", "utils.py"),
                node("lesson_L1", "L1: \"Setup\" (10m)"),
            ],
            edges: vec![
                Edge::import("src/app.py", "src/utils.py"),
                Edge {
                    from: "lesson_L1".into(),
                    to: "src/app.py".into(),
                    kind: EdgeKind::Source,
                    label: Some("source".into()),
                    dashes: true,
                },
                Edge::import("src/app.py", "missing.py"),
            ],
        };
        assert_snapshot!(to_mermaid(&graph), @r#"
        flowchart LR
          n0_src_app_py["app.py"]
          n1_src_utils_py["utils.py"]
          n2_lesson_L1["L1: #quot;Setup#quot; (10m)"]
          n0_src_app_py --> n1_src_utils_py
          n2_lesson_L1 -.->|source| n0_src_app_py
        "#);
    }

    #[test]
    fn empty_graph_is_header_only() {
        assert_eq!(to_mermaid(&Graph::default()), "flowchart LR\n");
    }
}
