//! Tolerant field deserializers for register records.
//!
//! The register API is loosely typed: identifiers arrive as numbers or
//! strings, optional text fields may be `null`, numbers or empty, and the
//! `Offices` field is occasionally not a list at all. Structural problems
//! are reported by the validation engine, so the typed model accepts
//! whatever it can and normalizes the rest to `None`/empty.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Reads an optional text field. Numbers and booleans are stringified;
/// `null`, arrays and objects become `None`.
///
/// # Errors
///
/// Only fails if the underlying deserializer cannot produce a JSON value.
pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

/// Reads an optional integer. Integral strings (`"3"`) are accepted.
///
/// # Errors
///
/// Only fails if the underlying deserializer cannot produce a JSON value.
pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Reads an optional floating point number. Numeric strings are accepted.
///
/// # Errors
///
/// Only fails if the underlying deserializer cannot produce a JSON value.
pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Reads a list of typed records. A missing or non-list value becomes an
/// empty list; an element that cannot be decoded is an error.
///
/// # Errors
///
/// Returns an error if any list element fails to deserialize as `T`.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(D::Error::custom))
            .collect(),
        _ => Ok(Vec::new()),
    }
}
