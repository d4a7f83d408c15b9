//! Document and pair types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object: the unit stored under one key.
pub type Document = Map<String, Value>;

/// A key with its decoded document, as yielded by queries.
///
/// Serializes as `{"key": ..., "value": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    /// The key inside its bucket.
    pub key: String,
    /// The decoded document.
    pub value: Document,
}

impl Pair {
    /// Creates a pair.
    pub fn new(key: impl Into<String>, value: Document) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Name of a JSON value's kind, for error messages.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
