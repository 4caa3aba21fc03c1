use std::sync::LazyLock;

use regex::Regex;

use crate::record::{ContextRecord, FileSource, RecordKind};

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{1,6}\s+(.*?)\s*#*\s*$").expect("markdown heading regex is valid")
});

struct Section {
    title: String,
    start_line: usize,
    end_line: usize,
    body: Vec<String>,
}

/// One record per heading section; text before the first heading becomes
/// an "Introduction" section. Headings inside fenced code are ignored.
pub(super) fn extract(source: &FileSource<'_>, text: &str) -> Vec<ContextRecord> {
    let mut sections = vec![Section {
        title: "Introduction".to_owned(),
        start_line: 1,
        end_line: 1,
        body: Vec::new(),
    }];
    let mut in_fence = false;

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }
        if !in_fence
            && let Some(caps) = HEADING.captures(line)
        {
            sections.push(Section {
                title: caps[1].to_owned(),
                start_line: idx + 1,
                end_line: idx + 1,
                body: Vec::new(),
            });
            continue;
        }
        if let Some(current) = sections.last_mut() {
            if !line.trim().is_empty() {
                current.end_line = idx + 1;
            }
            current.body.push(line.to_owned());
        }
    }

    let mut records = Vec::new();
    for section in sections {
        let body = section.body.join("\n");
        let body = body.trim();
        if body.is_empty() {
            continue;
        }
        let content = format!("{}\n\n{body}", section.title);
        let id = source.record_id(&format!("section:{}", records.len()));
        records.push(
            ContextRecord::new(source, id, RecordKind::Section, content)
                .with_lines(section.start_line, section.end_line),
        );
    }
    records
}
