use tree_sitter::{Node, Parser};

use crate::error::{IndexError, Result};
use crate::record::{ContextRecord, FileSource, RecordKind};

/// Module docstring, top-level imports, then one record per top-level
/// function or class.
///
/// Fails closed: a tree with syntax errors yields an error and no records.
pub(super) fn extract(source: &FileSource<'_>, text: &str) -> Result<Vec<ContextRecord>> {
    let grammar = source
        .lang
        .grammar()
        .ok_or_else(|| IndexError::Parse(format!("no grammar for {}", source.lang)))?;

    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| IndexError::Parse(format!("set_language failed: {e}")))?;

    let tree = parser
        .parse(text, None)
        .ok_or_else(|| IndexError::Parse(format!("parse failed for {}", source.path)))?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(IndexError::Parse(format!("syntax error in {}", source.path)));
    }

    let mut records = Vec::new();
    if let Some(doc) = module_docstring(&root, text) {
        records.push(doc_record(source, &doc));
    }
    if let Some(imports) = imports_record(source, &root, text) {
        records.push(imports);
    }

    let child_count = u32::try_from(root.named_child_count()).unwrap_or(u32::MAX);
    for i in 0..child_count {
        let Some(child) = root.named_child(i) else {
            continue;
        };
        let definition = if child.kind() == "decorated_definition" {
            match child.child_by_field_name("definition") {
                Some(def) => def,
                None => continue,
            }
        } else {
            child
        };
        let kind = match definition.kind() {
            "function_definition" => RecordKind::Function,
            "class_definition" => RecordKind::Class,
            _ => continue,
        };
        let Some(name) = definition
            .child_by_field_name("name")
            .map(|n| &text[n.byte_range()])
        else {
            continue;
        };

        let start = child.start_position().row + 1;
        let end = child.end_position().row + 1;
        let id = source.record_id(&format!("{name}:{start}"));
        records.push(
            ContextRecord::new(source, id, kind, text[child.byte_range()].to_owned())
                .with_lines(start, end),
        );
    }

    Ok(records)
}

struct Docstring {
    body: String,
    start: usize,
    end: usize,
}

fn module_docstring(root: &Node<'_>, text: &str) -> Option<Docstring> {
    let child_count = u32::try_from(root.named_child_count()).unwrap_or(u32::MAX);
    let first = (0..child_count)
        .filter_map(|i| root.named_child(i))
        .find(|n| n.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let body = strip_string_quotes(&text[string.byte_range()]).trim().to_owned();
    if body.is_empty() {
        return None;
    }
    Some(Docstring {
        body,
        start: string.start_position().row + 1,
        end: string.end_position().row + 1,
    })
}

fn doc_record(source: &FileSource<'_>, doc: &Docstring) -> ContextRecord {
    ContextRecord::new(
        source,
        source.record_id("module:0"),
        RecordKind::ModuleDoc,
        doc.body.clone(),
    )
    .with_lines(doc.start, doc.end)
}

/// All module-level `import` / `from ... import` statements as one record,
/// so the graph can see them.
fn imports_record(
    source: &FileSource<'_>,
    root: &Node<'_>,
    text: &str,
) -> Option<ContextRecord> {
    let child_count = u32::try_from(root.named_child_count()).unwrap_or(u32::MAX);
    let statements: Vec<Node<'_>> = (0..child_count)
        .filter_map(|i| root.named_child(i))
        .filter(|n| matches!(n.kind(), "import_statement" | "import_from_statement"))
        .collect();
    let (first, last) = (statements.first()?, statements.last()?);
    let content = statements
        .iter()
        .map(|n| &text[n.byte_range()])
        .collect::<Vec<_>>()
        .join("\n");
    Some(
        ContextRecord::new(
            source,
            source.record_id("imports:0"),
            RecordKind::Imports,
            content,
        )
        .with_lines(first.start_position().row + 1, last.end_position().row + 1),
    )
}

fn strip_string_quotes(literal: &str) -> &str {
    let unprefixed = literal.trim_start_matches(|c: char| "rRuUbBfF".contains(c));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = unprefixed
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner;
        }
    }
    unprefixed
}
