//! Dotted-path navigation over heterogeneous payload JSON.
//!
//! The embedded payload is a deeply nested Next.js document whose shape
//! drifts between page variants. Every field is therefore resolved through
//! an ordered list of candidate paths, first non-empty wins, instead of a
//! fixed deserialization schema.

use serde_json::Value;

/// Resolve a dotted path against `root`. Tokens address object keys, or
/// array indices when the token is all digits.
#[must_use]
pub fn lookup<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    let mut cur = root;
    for token in dotted.split('.') {
        cur = match cur {
            Value::Object(map) => map.get(token)?,
            Value::Array(items) => {
                let idx: usize = token.parse().ok()?;
                items.get(idx)?
            }
            _ => return None,
        };
    }
    Some(cur)
}

/// Empty means null, the empty string, or the empty list. Zero and `false`
/// are values.
#[must_use]
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// First candidate path that resolves to a non-empty value.
#[must_use]
pub fn first_non_empty<'a>(root: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|p| lookup(root, p))
        .find(|v| !is_empty(v))
}

/// Render a scalar the way the CSV expects it: strings as-is, numbers
/// without a trailing `.0` when integral, everything else empty.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                n.to_string()
            }
        }
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// `first_non_empty` rendered to a string, empty when no path resolves.
#[must_use]
pub fn first_string(root: &Value, paths: &[&str]) -> String {
    first_non_empty(root, paths).map(value_to_string).unwrap_or_default()
}

/// Interpret a value as epoch seconds. Accepts numbers and digit strings;
/// millisecond-scale values are scaled down.
#[must_use]
pub fn epoch_secs(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => {
            let digits: String = s.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()?
        }
        _ => return None,
    };
    if raw > 10_000_000_000 {
        Some(raw / 1000)
    } else {
        Some(raw)
    }
}
