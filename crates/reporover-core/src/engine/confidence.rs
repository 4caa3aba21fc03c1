use serde::{Deserialize, Serialize};

use reporover_index::ContextRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Score from the count of validated citations and whether they span both
/// code and documentation.
#[must_use]
pub fn score(valid_count: usize, diverse: bool) -> Confidence {
    let points = valid_count.min(3) + usize::from(diverse && valid_count > 0);
    match points {
        0 | 1 => Confidence::Low,
        2 => Confidence::Medium,
        _ => Confidence::High,
    }
}

/// Confidence for `valid` ids resolved against the contexts that were sent.
#[must_use]
pub fn assess(valid: &[String], contexts: &[&ContextRecord]) -> Confidence {
    let cited: Vec<&ContextRecord> = contexts
        .iter()
        .copied()
        .filter(|r| valid.contains(&r.id))
        .collect();
    let has_docs = cited.iter().any(|r| r.is_docs());
    let has_code = cited.iter().any(|r| !r.is_docs());
    score(valid.len(), has_docs && has_code)
}
