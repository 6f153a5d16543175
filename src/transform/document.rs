// src/transform/document.rs
//! Forgiving accessors over semi-structured JSON documents.
//!
//! Filings arrive with missing sub-objects, `null` where an object is
//! expected, and numbers encoded as strings. Every accessor here returns a
//! neutral default instead of failing.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

static EMPTY: Lazy<Value> = Lazy::new(|| Value::Object(Map::new()));

/// Borrowed view over one JSON object.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    value: &'a Value,
}

impl<'a> Document<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// Nested object at `key`, or an empty object when absent or not an object.
    pub fn section(&self, key: &str) -> Document<'a> {
        match self.value.get(key) {
            Some(v @ Value::Object(_)) => Document::new(v),
            _ => Document::new(&EMPTY),
        }
    }

    /// Raw value at the first of `keys` that is present and not null.
    pub fn field(&self, keys: &[&str]) -> Value {
        keys.iter()
            .filter_map(|k| self.value.get(*k))
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Array at `key`; anything else reads as empty.
    pub fn list(&self, key: &str) -> &'a [Value] {
        match self.value.get(key) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }

    /// Number at the first present key, accepting numeric strings.
    pub fn number(&self, keys: &[&str]) -> Option<f64> {
        as_f64(&self.field(keys))
    }
}

/// Coerces numbers and numeric strings; NaN and infinities read as missing.
pub fn as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Coerces booleans from bools, "true"/"false"/"1"/"0" strings and 0/1 numbers.
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Text form of strings and numbers (CIKs arrive as either). Blank strings read as missing.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_and_null_sections_read_as_empty() {
        let doc = json!({"issuer": null, "owner": {"name": "Jane"}});
        let root = Document::new(&doc);
        assert_eq!(root.section("issuer").field(&["name"]), Value::Null);
        assert_eq!(root.section("missing").section("deeper").field(&["x"]), Value::Null);
        assert_eq!(root.section("owner").field(&["name"]), json!("Jane"));
    }

    #[test]
    fn field_falls_back_across_aliases() {
        let doc = json!({"filedAt": null, "filed_at": "2024-01-02"});
        assert_eq!(Document::new(&doc).field(&["filedAt", "filed_at"]), json!("2024-01-02"));
    }

    #[test]
    fn list_ignores_non_arrays() {
        let doc = json!({"transactions": {"oops": 1}});
        assert!(Document::new(&doc).list("transactions").is_empty());
    }

    #[test]
    fn numeric_coercion_is_lenient_but_safe() {
        assert_eq!(as_f64(&json!("1,000.5")), Some(1000.5));
        assert_eq!(as_f64(&json!(150)), Some(150.0));
        assert_eq!(as_f64(&json!("invalid")), None);
        assert_eq!(as_f64(&json!(true)), None);
    }

    #[test]
    fn boolean_coercion() {
        assert_eq!(as_bool(&json!("TRUE")), Some(true));
        assert_eq!(as_bool(&json!(0)), Some(false));
        assert_eq!(as_bool(&json!("maybe")), None);
    }
}
