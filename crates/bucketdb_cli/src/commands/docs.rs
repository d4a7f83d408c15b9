//! Single-document commands: put, get, delete.

use super::CliError;
use crate::output::Format;
use bucketdb_core::{Db, Pair};
use serde_json::Value;
use std::io::Write;
use tracing::info;

/// Stores the JSON object `json` under `key`.
pub fn put(db: &Db, bucket: &str, key: &str, json: &str) -> Result<(), Box<dyn std::error::Error>> {
    let doc = match serde_json::from_str::<Value>(json)? {
        Value::Object(doc) => doc,
        other => {
            return Err(CliError::NotAnObject {
                found: kind(&other),
            }
            .into())
        }
    };
    db.put(bucket, key, &doc)?;
    info!(bucket, key, "stored document");
    Ok(())
}

/// Prints the pair stored under `key`.
pub fn get<W: Write>(
    db: &Db,
    bucket: &str,
    key: &str,
    format: Format,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = db.get(bucket, key)?;
    format.write(out, &Pair::new(key, doc))
}

/// Removes `key`.
pub fn delete(db: &Db, bucket: &str, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    db.delete(bucket, key)?;
    info!(bucket, key, "deleted document");
    Ok(())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let db = Db::open_in_memory();
        put(&db, "users", "alice", r#"{"age": 30}"#).unwrap();

        let mut out = Vec::new();
        get(&db, "users", "alice", Format::Json, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"key\":\"alice\",\"value\":{\"age\":30}}\n"
        );

        delete(&db, "users", "alice").unwrap();
        assert!(get(&db, "users", "alice", Format::Json, &mut Vec::new()).is_err());
    }

    #[test]
    fn put_rejects_non_objects() {
        let db = Db::open_in_memory();
        let err = put(&db, "b", "k", "[1, 2]").unwrap_err();
        assert_eq!(err.to_string(), "document must be a JSON object, got an array");
        assert!(put(&db, "b", "k", "{not json").is_err());
    }
}
