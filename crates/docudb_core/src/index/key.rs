//! Deterministic value normalization for equality index keys.
//!
//! Every indexable value maps to a stable string key so lookups and
//! entries agree regardless of JSON number representation or map key
//! order. The same normalization runs on both the write and lookup
//! paths.

use crate::document::parse_datetime;
use serde_json::Value;
use std::fmt::Write as _;

/// Key used for a document that lacks the indexed field.
pub const UNDEFINED_KEY: &str = "undefined";

/// Normalizes a possibly-absent value into its index key.
///
/// - absent → `undefined`
/// - `null` → `null`
/// - RFC 3339 string → `date:<epoch-ms>`
/// - string → `string:<s>`
/// - number → `number:<canonical>`
/// - boolean → `boolean:<b>`
/// - array/object → `obj:<canonical-json>`
#[must_use]
pub fn normalize(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return UNDEFINED_KEY.to_string();
    };
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean:{b}"),
        Value::Number(_) => format!("number:{}", canonical_number(value)),
        Value::String(s) => match parse_datetime(s) {
            Some(instant) => format!("date:{}", instant.timestamp_millis()),
            None => format!("string:{s}"),
        },
        Value::Array(_) | Value::Object(_) => format!("obj:{}", canonical_json(value)),
    }
}

/// Renders a number so integer-valued floats and integers agree.
fn canonical_number(value: &Value) -> String {
    match value.as_f64() {
        Some(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
            format!("{}", n as i64)
        }
        Some(n) => format!("{n}"),
        None => value.to_string(),
    }
}

/// Serializes a value with recursively sorted object keys.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Number(_) => {
            let _ = write!(out, "{}", canonical_number(value));
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", Value::String((*key).clone()));
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        other => {
            let _ = write!(out, "{other}");
        }
    }
}
