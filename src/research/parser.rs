//! Extraction of a single JSON object from free-form model output.
//!
//! Models wrap JSON in code fences, prefix it with prose or trail it with
//! commentary. Parsing here never fails loudly: callers get `None` and apply
//! their own recovery.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Locate and parse one JSON object in `raw`.
///
/// Tries, in order: the whole trimmed text, the body of a fenced code block,
/// and the span from the first `{` to the last `}`. Anything that is not a
/// JSON object yields `None`.
pub fn extract_json_object(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidates = [
        Some(trimmed),
        fenced_body(trimmed),
        brace_span(trimmed),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .find(Value::is_object)
}

/// Parse the JSON object in `raw` into `T`, or `None` when absent or mistyped.
pub fn parse_json_object<T: DeserializeOwned>(raw: &str) -> Option<T> {
    extract_json_object(raw).and_then(|value| serde_json::from_value(value).ok())
}

fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the opening fence line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
