//! Core data models shared by the store, orchestrator, and HTTP layer.

use serde::{Deserialize, Serialize};

/// Free-form metadata attached to a stored document.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A document as persisted in the knowledge store.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

/// One ranked hit returned by a similarity query.
///
/// `score` is the cosine distance to the query vector: `0.0` for an
/// identical direction, up to `2.0` for an opposite one. Lower ranks first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Builds the default metadata attached when the caller supplies none.
pub fn timestamp_metadata() -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("timestamp".to_string(), now_iso().into());
    metadata
}

/// Checks that every metadata value is a string, number, or boolean.
///
/// Nested objects, arrays, and nulls cannot be filtered on by the store and
/// are rejected up front.
pub fn validate_metadata(metadata: &Metadata) -> Result<(), String> {
    for (key, value) in metadata {
        match value {
            serde_json::Value::String(_)
            | serde_json::Value::Number(_)
            | serde_json::Value::Bool(_) => {}
            other => {
                return Err(format!(
                    "metadata value for '{}' must be a string, number, or boolean, got {}",
                    key,
                    json_kind(other)
                ))
            }
        }
    }
    Ok(())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::Bool(_) => "boolean",
    }
}

/// Current local time as ISO-8601 with microseconds.
pub fn now_iso() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
