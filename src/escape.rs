//! HTML escaping and the value-level output rules.

use serde_json::{Map, Value};

/// Marker key the `raw()` helper uses to tag a value as safe output.
pub(crate) const RAW_MARKER: &str = "$vellum_raw$";

/// Escape the five significant HTML characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Inverse of [`escape_html`] for the same entity set.
pub fn unescape_html(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

/// Wrap a value so the output escaping step passes it through untouched.
pub fn raw(value: Value) -> Value {
    let mut map = Map::new();
    map.insert(RAW_MARKER.to_string(), Value::Bool(true));
    map.insert("value".to_string(), value);
    Value::Object(map)
}

pub(crate) fn unwrap_raw(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) if map.get(RAW_MARKER) == Some(&Value::Bool(true)) => map.get("value"),
        _ => None,
    }
}

/// Escape a value for emission. Null is empty, raw-wrapped values pass
/// through, strings are escaped, everything else is stringified as-is.
pub fn escape_value(value: &Value) -> String {
    if let Some(inner) = unwrap_raw(value) {
        return display_value(inner);
    }
    match value {
        Value::Null => String::new(),
        Value::String(s) => escape_html(s),
        other => display_value(other),
    }
}

/// Stringify a value for output: null is empty, whole numbers print
/// without a fraction, arrays join their elements with commas.
pub fn display_value(value: &Value) -> String {
    if let Some(inner) = unwrap_raw(value) {
        return display_value(inner);
    }
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

pub(crate) fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            format!("{}", f as i64)
        }
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
