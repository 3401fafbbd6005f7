// Pull the JSON payload out of a model answer.
//
// Models sometimes wrap the object in a ```json fence or add a sentence
// before it. We take the fenced block if there is one, otherwise the span
// from the first `{` to its matching `}`.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Locate and parse the first JSON object in `text`.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(inner) = fenced_block(text) {
        if let Ok(v) = serde_json::from_str::<Value>(inner.trim()) {
            return Some(v);
        }
    }
    let span = object_span(text)?;
    serde_json::from_str(span).ok()
}

/// [`extract_json`] followed by a typed conversion.
pub fn extract_typed<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let value = extract_json(text).ok_or_else(|| "no JSON object in response".to_string())?;
    serde_json::from_value(value).map_err(|e| format!("unexpected response shape: {e}"))
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // Skip an info string such as `json`.
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Byte span of the first balanced `{ ... }`, honoring string literals.
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
