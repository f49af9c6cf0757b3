//! Helpers for interpreting the JSON data document.
//!
//! Templates are executed against a [`serde_json::Value`]. Absent data is
//! never an error: lookups return `None`, which the engine treats as the
//! "missing" sentinel, distinct from JSON `null`.

use std::borrow::Cow;

pub use serde_json::Value;

/// Returns the boolean interpretation of a node.
///
/// `null`, `false`, zero, the empty string and empty arrays and objects are
/// false. Everything else is true. A missing node (`None`) is always false.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Returns the textual representation of a node, as emitted into output.
///
/// Strings are returned verbatim, numbers and booleans in their JSON form,
/// `null` as the empty string and arrays and objects as compact JSON.
pub fn as_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s),
        Value::Bool(true) => Cow::Borrowed("true"),
        Value::Bool(false) => Cow::Borrowed("false"),
        Value::Number(n) => Cow::Owned(n.to_string()),
        v => Cow::Owned(v.to_string()),
    }
}

/// Coerces a node to a float.
///
/// Numbers convert directly, strings are parsed and booleans are `0` or `1`.
/// Returns `None` for anything else.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

/// Coerces a node to an integer, defaulting to zero.
///
/// Floats are truncated towards zero.
pub fn as_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// Returns a human readable name for the type of the node.
pub fn human(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
