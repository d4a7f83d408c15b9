//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use bucketdb_core::Document;
use proptest::prelude::*;
use serde_json::{Map, Number, Value};

/// Strategy for generating keys: short, non-empty, drawn from a small
/// alphabet so prefixes and ranges overlap often.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9a-d]{1,4}").expect("Invalid regex")
}

/// Strategy for generating valid dot-separated bucket paths.
pub fn bucket_path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::string::string_regex("[a-z][a-z0-9_]{0,7}").expect("Invalid regex"),
        1..4,
    )
    .prop_map(|segments| segments.join("."))
}

/// Strategy for JSON values the codec accepts: finite numbers only, and
/// nesting a few levels deep.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-1.0e12f64..1.0e12).prop_map(|f| Number::from_f64(f).map_or(Value::Null, Value::Number)),
        ".{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Strategy for generating documents.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::btree_map(".{1,12}", json_value_strategy(), 0..8)
        .prop_map(|map| map.into_iter().collect::<Map<String, Value>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketdb_core::BucketPath;

    proptest! {
        #[test]
        fn generated_paths_parse(path in bucket_path_strategy()) {
            prop_assert!(BucketPath::parse(&path).is_ok());
        }

        #[test]
        fn generated_keys_are_non_empty(key in key_strategy()) {
            prop_assert!(!key.is_empty());
        }
    }
}
