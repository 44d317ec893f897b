//! Redaction of sensitive values before they reach the audit log.

use serde_json::{Map, Value};

/// Replacement for redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Substrings that mark a key as sensitive, compared against the lowercased key.
const SENSITIVE_KEY_PARTS: [&str; 7] = [
    "password",
    "token",
    "secret",
    "apikey",
    "creditcard",
    "ssn",
    "email",
];

/// Whether values under `key` must be redacted.
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| lower.contains(part))
}

/// Copy of `value` with every sensitive key's value replaced by [`REDACTED`].
///
/// Recurses into nested objects. Arrays and scalars are copied as they are.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_map(map)),
        other => other.clone(),
    }
}

/// [`redact`] for an object.
pub fn redact_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let value = if is_sensitive_key(key) {
                Value::String(REDACTED.to_string())
            } else if let Value::Object(inner) = value {
                Value::Object(redact_map(inner))
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect()
}
