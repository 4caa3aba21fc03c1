use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::{Node, Parser};

use crate::languages::Lang;

/// A Python import reduced to what the resolver needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PyImport {
    /// Top-level package of an absolute import.
    Module(String),
    /// `from . import x` or `from .x import y`: a module next to the importer.
    Sibling(String),
}

static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)require\(\s*['"]([^'"]+)['"]\s*\)|import\s+[^'";]*?\s+from\s+['"]([^'"]+)['"]|^\s*import\s+['"]([^'"]+)['"]"#,
    )
    .expect("js import regex is valid")
});

/// Module specifiers from `require(...)`, `import ... from` and bare `import`.
#[must_use]
pub fn js_imports(code: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in JS_IMPORT.captures_iter(code) {
        let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };
        let spec = m.as_str().to_owned();
        if !out.contains(&spec) {
            out.push(spec);
        }
    }
    out
}

/// Imports found anywhere in `code`. Relative imports deeper than one level
/// are skipped. Syntax errors are tolerated: whatever parsed is used.
#[must_use]
pub fn python_imports(code: &str) -> Vec<PyImport> {
    let Some(grammar) = Lang::Python.grammar() else {
        return Vec::new();
    };
    let mut parser = Parser::new();
    if parser.set_language(&grammar).is_err() {
        return Vec::new();
    }
    let Some(tree) = parser.parse(code, None) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => collect_plain(&node, code, &mut out),
            "import_from_statement" => collect_from(&node, code, &mut out),
            _ => {
                let count = u32::try_from(node.named_child_count()).unwrap_or(u32::MAX);
                // reversed so the pop order follows source order
                for i in (0..count).rev() {
                    if let Some(child) = node.named_child(i) {
                        stack.push(child);
                    }
                }
            }
        }
    }

    let mut unique = Vec::with_capacity(out.len());
    for import in out {
        if !unique.contains(&import) {
            unique.push(import);
        }
    }
    unique
}

fn top_level(dotted: &str) -> String {
    dotted.split('.').next().unwrap_or(dotted).trim().to_owned()
}

/// The dotted name behind `a.b` or `a.b as c`.
fn imported_name<'c>(node: &Node<'_>, code: &'c str) -> Option<&'c str> {
    let target = if node.kind() == "aliased_import" {
        node.child_by_field_name("name")?
    } else {
        *node
    };
    Some(&code[target.byte_range()])
}

fn collect_plain(node: &Node<'_>, code: &str, out: &mut Vec<PyImport>) {
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        if let Some(dotted) = imported_name(&name, code) {
            out.push(PyImport::Module(top_level(dotted)));
        }
    }
}

fn collect_from(node: &Node<'_>, code: &str, out: &mut Vec<PyImport>) {
    let Some(module) = node.child_by_field_name("module_name") else {
        return;
    };
    if module.kind() != "relative_import" {
        out.push(PyImport::Module(top_level(&code[module.byte_range()])));
        return;
    }

    let text = &code[module.byte_range()];
    let depth = text.chars().take_while(|c| *c == '.').count();
    if depth != 1 {
        return;
    }
    let rest = text[depth..].trim();
    if !rest.is_empty() {
        out.push(PyImport::Sibling(top_level(rest)));
        return;
    }
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        if let Some(dotted) = imported_name(&name, code) {
            out.push(PyImport::Sibling(top_level(dotted)));
        }
    }
}
