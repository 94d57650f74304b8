//! Document values and dot-path traversal.
//!
//! Documents are JSON objects whose maps preserve key insertion order.
//! Dates travel inside documents as RFC 3339 strings; the helpers here
//! recognize them wherever date semantics are needed (equality by
//! epoch-ms, native ordering for range operators).

use crate::error::{DbError, DbResult};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A document: a JSON object with insertion-ordered keys.
pub type Document = Map<String, Value>;

/// Parses an RFC 3339 date-time string.
#[must_use]
pub fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

/// Current instant as an RFC 3339 string with millisecond resolution.
#[must_use]
pub fn now_millis() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current instant as an RFC 3339 string with microsecond resolution.
///
/// Metadata clocks use this so `updated` advances strictly across
/// adjacent operations.
#[must_use]
pub fn now_micros() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Requires `value` to be a JSON object and unwraps it.
pub fn into_object(value: Value) -> DbResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DbError::invalid_document(format!(
            "expected an object, got {}",
            type_name(&other)
        ))),
    }
}

/// Returns the JSON type name of a value.
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Resolves a dot path against a document.
///
/// Descends nested maps only; arrays are not traversed.
#[must_use]
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Sets the value at a dot path, creating intermediate maps.
///
/// Intermediate values that are missing or not objects are replaced by
/// empty maps so the path can always be completed.
pub fn set_path(doc: &mut Document, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = doc;
    for segment in &segments[..segments.len() - 1] {
        let slot = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = slot.as_object_mut().expect("slot was just made an object");
    }
    current.insert(segments[segments.len() - 1].to_string(), value);
}

/// Removes the value at a dot path.
///
/// Silent when any intermediate segment is absent or not an object.
pub fn unset_path(doc: &mut Document, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = doc;
    for segment in &segments[..segments.len() - 1] {
        match current.get_mut(*segment).and_then(Value::as_object_mut) {
            Some(next) => current = next,
            None => return,
        }
    }
    current.remove(segments[segments.len() - 1]);
}

/// Adds `delta` to the numeric value at a dot path.
///
/// An absent value counts as zero; a present non-numeric value is an
/// `InvalidType` error.
pub fn inc_path(doc: &mut Document, path: &str, delta: f64) -> DbResult<()> {
    let current = match get_path(doc, path) {
        None => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(other) => {
            return Err(DbError::InvalidType {
                path: path.to_string(),
                message: format!("cannot increment a {}", type_name(other)),
            })
        }
    };
    set_path(doc, path, number_value(current + delta));
    Ok(())
}

/// Builds a JSON number, preferring integer representation when exact.
#[must_use]
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// Structural deep equality.
///
/// Numbers compare by numeric value regardless of internal representation.
/// Two strings that both parse as RFC 3339 compare by epoch milliseconds.
/// Objects compare by key set with recursive value equality.
#[must_use]
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::String(x), Value::String(y)) => {
            match (parse_datetime(x), parse_datetime(y)) {
                (Some(dx), Some(dy)) => dx.timestamp_millis() == dy.timestamp_millis(),
                _ => x == y,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(va, vb)| deep_equal(va, vb))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, va)| y.get(k).is_some_and(|vb| deep_equal(va, vb)))
        }
        _ => a == b,
    }
}

/// Native ordering for range operators and sorting.
///
/// Numbers order numerically; strings that both parse as RFC 3339 order
/// by instant, other string pairs lexicographically. Mixed or unordered
/// types return `None`.
#[must_use]
pub fn compare_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (parse_datetime(x), parse_datetime(y)) {
                (Some(dx), Some(dy)) => Some(dx.timestamp_millis().cmp(&dy.timestamp_millis())),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
