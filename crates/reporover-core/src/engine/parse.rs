//! Strict single-object JSON extraction from model output.

use serde::de::DeserializeOwned;

/// Remove a surrounding markdown code fence, with or without a language tag.
#[must_use]
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(newline) if rest[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
                &rest[newline + 1..]
            }
            _ => rest,
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse `raw` as exactly one JSON object of type `T`.
///
/// # Errors
///
/// Returns a human-readable reason when the text is not a lone object or does
/// not match `T`.
pub fn parse_contract<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err("empty response".into());
    }
    if !text.starts_with('{') || !text.ends_with('}') {
        return Err("response is not a single JSON object".into());
    }
    serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))
}
