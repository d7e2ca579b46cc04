//! Secret redaction for log output.
//!
//! Any mapping key whose lower-cased name is in [`SENSITIVE_KEYS`] has its
//! value replaced with [`REDACTED`], at any depth. Serialized output longer
//! than the limit is cut and marked with [`TRUNCATION_MARKER`].

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Keys whose values never reach a log line.
pub const SENSITIVE_KEYS: [&str; 9] = [
    "authorization",
    "email",
    "jwe",
    "phone",
    "private_key",
    "private_key_b64",
    "public-token",
    "signature",
    "token",
];

/// Replacement for sensitive values.
pub const REDACTED: &str = "<redacted>";

/// Appended to output cut at the length limit.
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Default limit, in characters, for a single serialized payload.
pub const DEFAULT_MAX_LEN: usize = 2000;

/// Whether values under `key` must be redacted. Case-insensitive.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&key.as_str())
}

/// Returns a copy of `value` with every sensitive key's value replaced.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let inner = if is_sensitive_key(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(inner)
                    };
                    (key.clone(), inner)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// Cuts `text` to at most `max_len` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed.
pub fn truncate(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

/// Redacts and serializes a payload for logging.
///
/// The payload is converted to JSON, redacted and written compactly. If it
/// cannot be represented as JSON, its `Debug` form is used instead. The result
/// is truncated to `max_len` characters.
pub fn format_for_log<T>(payload: &T, max_len: usize) -> String
where
    T: Serialize + fmt::Debug + ?Sized,
{
    let rendered = serde_json::to_value(payload)
        .and_then(|value| serde_json::to_string(&redact(&value)))
        .unwrap_or_else(|_| format!("{payload:?}"));
    truncate(&rendered, max_len)
}

/// Formats an HTTP response body for logging.
///
/// JSON bodies are parsed, redacted and re-serialized compactly. Anything else
/// is truncated as-is. An empty body stays empty.
pub fn format_response_text(body: &str, max_len: usize) -> String {
    if body.is_empty() {
        return String::new();
    }
    serde_json::from_str::<Value>(body).map_or_else(
        |_| truncate(body, max_len),
        |value| format_for_log(&value, max_len),
    )
}

/// Shortens a signature to its first and last 16 characters.
///
/// Short signatures are returned unchanged.
pub fn abbreviate_signature(signature: &str) -> String {
    let count = signature.chars().count();
    if count <= 32 {
        return signature.to_string();
    }
    let head: String = signature.chars().take(16).collect();
    let tail: String = signature.chars().skip(count - 16).collect();
    format!("{head}...{tail}")
}
