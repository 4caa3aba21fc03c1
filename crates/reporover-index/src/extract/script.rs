use std::sync::LazyLock;

use regex::Regex;

use super::ExtractConfig;
use crate::record::{ContextRecord, FileSource, RecordKind};

static FUNCTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(",
        r"([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?function\b",
        r"([A-Za-z_$][\w$]*)\s*:\s*(?:async\s+)?function\b",
        r"(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>",
        r"([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?\([^)]*\)\s*=>",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("script function regex is valid"))
    .collect()
});

static TRIGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfunction\b|=>").expect("script trigger regex is valid"));

/// A `function` keyword or an arrow outside a line comment.
fn is_trigger(line: &str) -> bool {
    let code = line.trim_start();
    if code.starts_with("//") || code.starts_with("/*") || code.starts_with('*') {
        return false;
    }
    TRIGGER.is_match(code)
}

fn function_name(line: &str) -> Option<&str> {
    FUNCTION_PATTERNS
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Pattern-based windows around function-like lines.
///
/// A matched window covers `script_lines_before` lines of lead-in and up to
/// `script_lines_after` lines from the match; scanning resumes at its end. Files
/// with no function lines become a single capped record.
pub(super) fn extract(
    source: &FileSource<'_>,
    text: &str,
    config: &ExtractConfig,
) -> Vec<ContextRecord> {
    let lines: Vec<&str> = text.lines().collect();
    let mut records = Vec::new();
    let mut prev_end = 0;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if !is_trigger(line) {
            i += 1;
            continue;
        }
        let start = i.saturating_sub(config.script_lines_before).max(prev_end);
        let end = (i + config.script_lines_after.max(1)).min(lines.len());
        let name = function_name(line).map_or_else(|| format!("anon_{}", i + 1), str::to_owned);

        let id = source.record_id(&format!("{name}:{}", start + 1));
        records.push(
            ContextRecord::new(source, id, RecordKind::Function, lines[start..end].join("\n"))
                .with_lines(start + 1, end),
        );
        prev_end = end;
        i = end;
    }

    if records.is_empty() && !text.trim().is_empty() {
        let capped = match text.char_indices().nth(config.whole_file_chars) {
            Some((idx, _)) => &text[..idx],
            None => text,
        };
        records.push(
            ContextRecord::new(source, source.record_id("0"), RecordKind::File, capped.to_owned())
                .with_lines(1, lines.len().max(1)),
        );
    }

    records
}
