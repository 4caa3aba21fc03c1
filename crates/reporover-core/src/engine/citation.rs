//! Mechanical validation of cited context ids.

use std::collections::HashSet;

pub const NO_VALID_SOURCES: &str = "No valid sources cited";

/// Checks citations against the ids that were actually sent to the model.
#[derive(Debug)]
pub struct CitationCheck<'a> {
    allowed: HashSet<&'a str>,
    valid: Vec<String>,
    warnings: Vec<String>,
}

impl<'a> CitationCheck<'a> {
    #[must_use]
    pub fn new(included: &'a [String]) -> Self {
        Self {
            allowed: included.iter().map(String::as_str).collect(),
            valid: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Keep only allowed, distinct ids in `ids`, warning once per dropped id.
    ///
    /// `location` names the field in warnings, e.g. `L1 step 2 evidence`.
    pub fn filter(&mut self, ids: &mut Vec<String>, location: &str) {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(ids.len());
        for id in ids.drain(..) {
            let id = id.trim().to_owned();
            if !self.allowed.contains(id.as_str()) {
                self.warnings
                    .push(format!("{location}: dropped unknown context id '{id}'"));
                continue;
            }
            if !seen.insert(id.clone()) {
                continue;
            }
            if !self.valid.contains(&id) {
                self.valid.push(id.clone());
            }
            kept.push(id);
        }
        *ids = kept;
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    #[must_use]
    pub fn valid(&self) -> &[String] {
        &self.valid
    }

    /// Distinct valid ids in first-cited order plus accumulated warnings.
    #[must_use]
    pub fn finish(mut self) -> (Vec<String>, Vec<String>) {
        if self.valid.is_empty() {
            self.warnings.push(NO_VALID_SOURCES.to_owned());
        }
        (self.valid, self.warnings)
    }
}
