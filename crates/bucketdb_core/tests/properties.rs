//! Behavioural properties of the document layer.

use bucketdb_core::{BucketPath, CoreError, Db, Document, Pair};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tempfile::tempdir;

fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("object")
}

fn put_n(db: &Db, bucket: &str, n: usize) {
    db.update(|tx| {
        for i in 0..n {
            tx.put(bucket, &i.to_string(), &doc(json!({"key": i})))?;
        }
        Ok(())
    })
    .unwrap();
}

fn keys(pairs: impl Iterator<Item = Pair>) -> Vec<String> {
    pairs.map(|pair| pair.key).collect()
}

#[test]
fn put_then_get_round_trips() {
    let db = Db::open_in_memory();
    let document = doc(json!({"foo": "bar", "baz": 23.0, "n": -4, "nested": {"xs": [1, null, true]}}));
    db.put("test.bucket", "testkey", &document).unwrap();
    assert_eq!(db.get("test.bucket", "testkey").unwrap(), document);
}

#[test]
fn last_write_wins() {
    let db = Db::open_in_memory();
    db.put("b", "k", &doc(json!({"v": 1}))).unwrap();
    db.put("b", "k", &doc(json!({"v": 2}))).unwrap();
    assert_eq!(db.get("b", "k").unwrap(), doc(json!({"v": 2})));
}

#[test]
fn delete_then_get_is_no_such_key() {
    let db = Db::open_in_memory();
    db.put("b", "k", &doc(json!({"v": 1}))).unwrap();
    db.delete("b", "k").unwrap();
    assert!(matches!(
        db.get("b", "k"),
        Err(CoreError::NoSuchKey { ref bucket, ref key }) if bucket == "b" && key == "k"
    ));
}

#[test]
fn get_from_missing_bucket_is_no_such_bucket() {
    let db = Db::open_in_memory();
    db.put("a.b", "k", &Document::new()).unwrap();
    assert!(db.get("a.c", "k").unwrap_err().is_no_such_bucket());
    assert!(db.delete("x", "k").unwrap_err().is_no_such_bucket());
    assert!(db.all("a.c").unwrap_err().is_no_such_bucket());
}

#[test]
fn prefix_yields_matching_keys_in_byte_order() {
    let db = Db::open_in_memory();
    put_n(&db, "test.bucket", 12);
    assert_eq!(keys(db.prefix("test.bucket", "1").unwrap()), ["1", "10", "11"]);
}

#[test]
fn range_is_inclusive_and_lexicographic() {
    let db = Db::open_in_memory();
    put_n(&db, "test.bucket", 11);
    assert_eq!(
        keys(db.range("test.bucket", "1", "3").unwrap()),
        ["1", "10", "2", "3"]
    );
    assert!(keys(db.range("test.bucket", "3", "1").unwrap()).is_empty());
    assert!(keys(db.range("test.bucket", "a", "z").unwrap()).is_empty());
}

#[test]
fn filter_selects_matching_documents() {
    let db = Db::open_in_memory();
    put_n(&db, "test.bucket", 100);
    let pairs: Vec<Pair> = db.find("test.bucket", ".key >= 98").unwrap().collect();
    assert_eq!(
        pairs,
        [
            Pair::new("98", doc(json!({"key": 98}))),
            Pair::new("99", doc(json!({"key": 99}))),
        ]
    );
}

#[test]
fn filtered_prefix_and_range() {
    let db = Db::open_in_memory();
    put_n(&db, "b", 100);
    assert_eq!(
        keys(db.find_prefix("b", "9", ".key % 2 == 0").unwrap()),
        ["90", "92", "94", "96", "98"]
    );
    assert_eq!(keys(db.find_range("b", "20", "25", ".key > 22").unwrap()), ["23", "24", "25"]);
}

#[test]
fn stream_filter_stage_composes() {
    let db = Db::open_in_memory();
    put_n(&db, "b", 30);
    let stream = db
        .prefix("b", "2")
        .unwrap()
        .filtered(".key > 21")
        .unwrap()
        .filtered(".key < 25")
        .unwrap();
    assert_eq!(keys(stream), ["22", "23", "24"]);
}

#[test]
fn malformed_filter_fails_before_scanning() {
    let db = Db::open_in_memory();
    put_n(&db, "b", 3);
    assert!(matches!(db.find("b", ".key >="), Err(CoreError::FilterParse(_))));
    assert!(matches!(
        db.all("b").unwrap().filtered("(("),
        Err(CoreError::FilterParse(_))
    ));
    assert_eq!(db.engine().active_readers(), 0);
}

#[test]
fn evaluation_errors_skip_the_document() {
    let db = Db::open_in_memory();
    db.update(|tx| {
        tx.put("b", "1", &doc(json!({"v": 5})))?;
        tx.put("b", "2", &doc(json!({"v": "five"})))?;
        tx.put("b", "3", &doc(json!({"v": 7})))
    })
    .unwrap();
    assert_eq!(keys(db.find("b", ".v > 4").unwrap()), ["1", "3"]);
    // A non-boolean result is a non-match, not an error.
    assert!(keys(db.find("b", ".v").unwrap()).is_empty());
}

#[test]
fn bucket_listing_is_depth_first() {
    let db = Db::open_in_memory();
    for leaf in ["foo.bar.a", "foo.bar.b", "foo.bar.c"] {
        db.put(leaf, "k", &Document::new()).unwrap();
    }
    let listed: Vec<String> = db.buckets().unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(listed, ["foo", "foo.bar", "foo.bar.a", "foo.bar.b", "foo.bar.c"]);
}

#[test]
fn nested_bucket_keys_are_not_documents() {
    let db = Db::open_in_memory();
    db.put("a", "doc", &Document::new()).unwrap();
    db.put("a.child", "k", &Document::new()).unwrap();
    assert_eq!(keys(db.all("a").unwrap()), ["doc"]);
    assert!(db.get("a", "child").unwrap_err().is_no_such_key());
}

#[test]
fn backup_reopens_with_identical_pairs() {
    let dir = tempdir().unwrap();
    let source = Db::open(&dir.path().join("source.db")).unwrap();
    put_n(&source, "numbers", 50);
    for leaf in ["foo.bar.a", "foo.bar.b"] {
        source.put(leaf, "k", &doc(json!({"leaf": leaf}))).unwrap();
    }

    let backup_path = dir.path().join("backup.db");
    let written = source.backup_to_file(&backup_path).unwrap();
    assert!(written > 0);
    // Writes after the backup are not in it.
    source.put("numbers", "late", &Document::new()).unwrap();

    let copy = Db::open(&backup_path).unwrap();
    let source_buckets = source.buckets().unwrap();
    assert_eq!(copy.buckets().unwrap(), source_buckets);
    for bucket in &source_buckets {
        let mut expected: Vec<Pair> = source.all(bucket.as_str()).unwrap().collect();
        expected.retain(|pair| pair.key != "late");
        let actual: Vec<Pair> = copy.all(bucket.as_str()).unwrap().collect();
        assert_eq!(actual, expected, "bucket {bucket}");
    }
}

#[test]
fn data_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    {
        let db = Db::open(&path).unwrap();
        put_n(&db, "test.bucket", 10);
        db.delete("test.bucket", "3").unwrap();
        db.close().unwrap();
    }
    let db = Db::open(&path).unwrap();
    assert_eq!(keys(db.all("test.bucket").unwrap()).len(), 9);
    assert!(db.get("test.bucket", "3").unwrap_err().is_no_such_key());
    assert!(db.size().unwrap() > 0);
}

#[test]
fn open_fails_for_missing_directory() {
    assert!(Db::open(std::path::Path::new("/invalid/path/test.db")).is_err());
}

#[test]
fn bucket_paths_from_listing_address_buckets() {
    let db = Db::open_in_memory();
    db.put("a.b", "k", &doc(json!({"x": 1}))).unwrap();
    let path: BucketPath = db.buckets().unwrap().pop().unwrap();
    assert_eq!(path.as_str(), "a.b");
    assert_eq!(db.get(path.as_str(), "k").unwrap(), doc(json!({"x": 1})));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Scans agree with a sorted map of what was written.
    #[test]
    fn scans_match_a_model(
        entries in prop::collection::btree_map("[a-c]{1,3}", 0i64..1000, 0..40),
        prefix in "[a-c]{0,2}",
        start in "[a-c]{1,2}",
        end in "[a-c]{1,2}",
    ) {
        let db = Db::open_in_memory();
        db.update(|tx| {
            for (key, n) in &entries {
                tx.put("m", key, &doc(json!({"n": n})))?;
            }
            Ok(())
        }).unwrap();
        let model: BTreeMap<&String, &i64> = entries.iter().collect();

        if entries.is_empty() {
            prop_assert!(db.all("m").unwrap_err().is_no_such_bucket());
            return Ok(());
        }

        let all = keys(db.all("m").unwrap());
        prop_assert_eq!(all, model.keys().map(|k| k.to_string()).collect::<Vec<_>>());

        let by_prefix = keys(db.prefix("m", &prefix).unwrap());
        let expected: Vec<String> = model.keys().filter(|k| k.starts_with(prefix.as_str())).map(|k| k.to_string()).collect();
        prop_assert_eq!(by_prefix, expected);

        let by_range = keys(db.range("m", &start, &end).unwrap());
        let expected: Vec<String> = model
            .keys()
            .filter(|k| start.as_str() <= k.as_str() && k.as_str() <= end.as_str())
            .map(|k| k.to_string())
            .collect();
        prop_assert_eq!(by_range, expected);
    }
}
