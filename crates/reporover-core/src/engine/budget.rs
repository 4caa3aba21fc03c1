//! Char-bounded context block assembly.

use reporover_index::ContextRecord;

/// Accumulates `CONTEXT_ID` blocks until the next one would overflow.
///
/// The ids of the blocks that made it in are the only ids the model may cite.
#[derive(Debug, Clone)]
pub struct PromptBudget {
    limit: usize,
    used: usize,
    text: String,
    included: Vec<String>,
}

impl PromptBudget {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: 0,
            text: String::new(),
            included: Vec::new(),
        }
    }

    #[must_use]
    pub fn block(record: &ContextRecord) -> String {
        format!(
            "CONTEXT_ID: {}\nFILE: {}\nEXCERPT:\n{}\n---END CONTEXT\n\n",
            record.id, record.file_path, record.excerpt
        )
    }

    /// Append `record` if it fits. Returns `false` without modifying the
    /// budget when it does not.
    pub fn try_push(&mut self, record: &ContextRecord) -> bool {
        let block = Self::block(record);
        let cost = block.chars().count();
        if self.used + cost > self.limit {
            return false;
        }
        self.used += cost;
        self.text.push_str(&block);
        self.included.push(record.id.clone());
        true
    }

    /// Push records in order, stopping at the first that does not fit.
    pub fn fill<'a>(&mut self, records: impl IntoIterator<Item = &'a ContextRecord>) {
        for record in records {
            if !self.try_push(record) {
                tracing::debug!(
                    id = %record.id,
                    used = self.used,
                    limit = self.limit,
                    "context budget exhausted"
                );
                break;
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    #[must_use]
    pub fn included(&self) -> &[String] {
        &self.included
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn render(&self) -> &str {
        self.text.trim_end()
    }
}

#[cfg(test)]
mod tests {
    use reporover_index::languages::Lang;
    use reporover_index::record::{FileSource, RecordKind};

    use super::*;

    fn record(id: &str, body: &str) -> ContextRecord {
        let source = FileSource {
            repo_id: "acme/widgets",
            path: "README.md",
            lang: Lang::Markdown,
            priority: 0,
        };
        ContextRecord::new(&source, id.into(), RecordKind::Section, body.into())
    }

    #[test]
    fn block_format() {
        let block = PromptBudget::block(&record("r:README.md:section:0", "Setup\n\nRun it."));
        assert_eq!(
            block,
            "CONTEXT_ID: r:README.md:section:0\nFILE: README.md\nEXCERPT:\nSetup\n\nRun it.\n---END CONTEXT\n\n"
        );
    }

    #[test]
    fn stops_before_overflow() {
        let a = record("a", &"x".repeat(100));
        let b = record("b", &"y".repeat(100));
        let cost = PromptBudget::block(&a).chars().count();
        let mut budget = PromptBudget::new(cost + 10);
        budget.fill([&a, &b]);
        assert_eq!(budget.included(), ["a"]);
        assert_eq!(budget.used(), cost);
        assert!(!budget.render().contains("CONTEXT_ID: b"));
    }

    #[test]
    fn exact_fit_is_included() {
        let a = record("a", "body");
        let mut budget = PromptBudget::new(PromptBudget::block(&a).chars().count());
        assert!(budget.try_push(&a));
    }

    #[test]
    fn nothing_fits() {
        let mut budget = PromptBudget::new(5);
        budget.fill([&record("a", "body")]);
        assert!(budget.is_empty());
        assert_eq!(budget.render(), "");
    }

    #[test]
    fn fill_stops_at_first_misfit() {
        let big = record("big", &"z".repeat(300));
        let small = record("small", "s");
        let mut budget = PromptBudget::new(PromptBudget::block(&small).chars().count() * 2);
        budget.fill([&small, &big, &small]);
        assert_eq!(budget.included(), ["small"]);
    }
}
