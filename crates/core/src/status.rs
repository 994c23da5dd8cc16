//! Wire shape of the `GET /status/{task_id}` response.
//!
//! The backend builds this payload ad hoc, so every field is optional
//! and read leniently: a field of the wrong JSON type is dropped instead
//! of failing the whole payload. Only `status` decides the projection.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Raw status payload for a single task, as returned by the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusPayload {
    /// One of `queued`, `processing`, `completed`, `error` (anything else
    /// is carried through and treated as unrecognized).
    #[serde(default, deserialize_with = "string_or_empty")]
    pub status: String,
    #[serde(default)]
    pub progress: Option<Value>,
    /// Failure description, present with `status == "error"`. Structured
    /// errors are kept as compact JSON text.
    #[serde(default, deserialize_with = "message")]
    pub error: Option<String>,
    /// Output filenames, present with `status == "completed"`. Entries
    /// that are not strings are skipped.
    #[serde(default, deserialize_with = "string_list")]
    pub output_files: Option<Vec<String>>,
    #[serde(default, deserialize_with = "string")]
    pub original_file: Option<String>,
    /// Name of the uploaded file as the backend recorded it.
    #[serde(default, deserialize_with = "string")]
    pub filename: Option<String>,
    #[serde(default)]
    pub num_segments: Option<Value>,
    /// Older backends nest the processing result here instead of
    /// flattening it into the top level.
    #[serde(default, deserialize_with = "nested_result")]
    pub result: Option<NestedResult>,
}

/// The nested `result` object some backend versions return.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NestedResult {
    #[serde(default, deserialize_with = "string")]
    pub original_file: Option<String>,
    #[serde(default)]
    pub num_segments: Option<Value>,
}

impl StatusPayload {
    /// Build a payload carrying only a status string. Mostly useful for
    /// tests and fakes.
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient field readers
// ---------------------------------------------------------------------------

fn string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn string_or_empty<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(string(de)?.unwrap_or_default())
}

fn message<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

fn string_list<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<String>>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

fn nested_result<'de, D: Deserializer<'de>>(de: D) -> Result<Option<NestedResult>, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(de)?).ok())
}

/// Read a loosely-typed JSON number as a non-negative float.
///
/// Returns `None` for `null`, `false`, empty strings, non-numeric strings
/// and negative values, i.e. everything a JavaScript client would treat as
/// falsy or unusable.
pub fn lenient_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(true) => 1.0,
        _ => return None,
    };
    (n.is_finite() && n > 0.0).then_some(n)
}
