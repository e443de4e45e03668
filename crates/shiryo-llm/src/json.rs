//! Lenient JSON recovery for model output.
//!
//! Models wrap their JSON in prose and code fences; pulling out the
//! outermost object before parsing recovers most of it.

use serde_json::Value;

/// Extract and parse the first top-level JSON object in `text`.
///
/// Scans from the first `{` to its matching brace, respecting strings and
/// escapes, and falls back to the last `}` when the braces never balance.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..=start + offset];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }

    // Unbalanced: try everything up to the last closing brace
    let end = text.rfind('}')?;
    serde_json::from_str(&text[start..=end]).ok()
}

/// Extract a JSON array of integers from model output, tolerating prose
/// around it.
#[must_use]
pub fn extract_int_array(text: &str) -> Option<Vec<i64>> {
    let start = text.find('[')?;
    let end = text[start..].find(']')? + start;
    let value: Value = serde_json::from_str(&text[start..=end]).ok()?;
    value
        .as_array()?
        .iter()
        .map(serde_json::Value::as_i64)
        .collect()
}
