//! Helpers shared by the request pipeline
//!
//! URL resolution, server error-message extraction, and UTF-8 safe
//! truncation for response bodies that end up in logs.

/// Fallback message when neither the body nor the status carries one
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Resolve a request target against the API base URL.
///
/// Targets starting with `http` are used verbatim; anything else is
/// appended to `base_url`, with exactly one `/` between them.
///
/// # Example
/// ```
/// use pasale_client::utils::resolve_url;
///
/// assert_eq!(resolve_url("http://h/api", "/products/"), "http://h/api/products/");
/// assert_eq!(resolve_url("http://h/api/", "products/"), "http://h/api/products/");
/// assert_eq!(resolve_url("http://h/api", "https://cdn/x"), "https://cdn/x");
/// ```
#[must_use]
pub fn resolve_url(base_url: &str, target: &str) -> String {
    if target.starts_with("http") {
        return target.to_string();
    }
    let base = base_url.trim_end_matches('/');
    let path = target.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Pull a human-readable message out of an error response body.
///
/// Looks at the JSON fields `error`, `message` and `detail`, in that order.
/// Falls back to the status text, then to [`GENERIC_ERROR_MESSAGE`].
#[must_use]
pub fn extract_error_message(body: &[u8], status_text: Option<&str>) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for field in ["error", "message", "detail"] {
            if let Some(message) = value.get(field).and_then(message_text) {
                return message;
            }
        }
    }

    status_text
        .filter(|s| !s.is_empty())
        .map_or_else(|| GENERIC_ERROR_MESSAGE.to_string(), str::to_string)
}

// Django REST framework sometimes nests messages in arrays.
fn message_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(message_text),
        _ => None,
    }
}

/// Truncate a string at a UTF-8 boundary, at most `max_bytes` long.
#[inline]
#[must_use]
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    &s[..boundary]
}

/// Render a response body for a log line, with `...` when truncated.
#[must_use]
pub fn body_preview(body: &[u8], max_bytes: usize) -> String {
    let text = String::from_utf8_lossy(body);
    let truncated = safe_truncate(&text, max_bytes);
    if truncated.len() < text.len() {
        format!("{truncated}...")
    } else {
        truncated.to_string()
    }
}
