/// Bounded attempts with a prompt rewrite between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Produces the prompt for the next attempt from the previous one.
    pub augment: fn(&str) -> String,
}

pub const JSON_REMINDER: &str = "IMPORTANT: Return ONLY valid JSON.";

fn append_json_reminder(prompt: &str) -> String {
    format!("{prompt}\n\n{JSON_REMINDER}")
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            augment: append_json_reminder,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }
}
