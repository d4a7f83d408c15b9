//! End-to-end tests for the storage engine over real files.

use bucketdb_storage::{
    BucketHandle, Engine, EngineOptions, EngineTx, StorageBackend, StorageError,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::tempdir;

fn path_handle(tx: &mut EngineTx, path: &[&str]) -> BucketHandle {
    let mut handle: Option<BucketHandle> = None;
    for segment in path {
        handle = Some(
            tx.create_bucket_if_absent(handle.as_ref(), segment.as_bytes())
                .unwrap(),
        );
    }
    handle.unwrap()
}

fn dump(engine: &Engine, path: &[&str]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let tx = engine.begin(false).unwrap();
    let mut handle: Option<BucketHandle> = None;
    for segment in path {
        handle = tx.bucket(handle.as_ref(), segment.as_bytes()).unwrap();
        assert!(handle.is_some(), "missing bucket {segment}");
    }
    tx.cursor(handle.as_ref())
        .unwrap()
        .filter_map(|e| e.value.map(|v| (e.key.to_vec(), v.to_vec())))
        .collect()
}

#[test]
fn committed_data_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        let engine = Engine::open(&path, EngineOptions::default()).unwrap();
        let mut tx = engine.begin(true).unwrap();
        let bucket = path_handle(&mut tx, &["foo", "bar"]);
        tx.put(&bucket, b"a", b"1").unwrap();
        tx.put(&bucket, b"b", b"2").unwrap();
        tx.commit().unwrap();

        let mut tx = engine.begin(true).unwrap();
        let bucket = path_handle(&mut tx, &["foo", "bar"]);
        assert!(tx.delete(&bucket, b"a").unwrap());
        assert!(!tx.delete(&bucket, b"a").unwrap());
        tx.put(&bucket, b"c", b"3").unwrap();
        tx.commit().unwrap();

        let mut tx = engine.begin(true).unwrap();
        let bucket = path_handle(&mut tx, &["foo", "bar"]);
        tx.put(&bucket, b"never", b"x").unwrap();
        tx.rollback();

        engine.close().unwrap();
    }

    let engine = Engine::open(&path, EngineOptions::default()).unwrap();
    assert_eq!(
        dump(&engine, &["foo", "bar"]),
        vec![(b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())]
    );
}

#[test]
fn torn_tail_is_discarded_on_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    let committed_len = {
        let engine = Engine::open(&path, EngineOptions::default()).unwrap();
        let mut tx = engine.begin(true).unwrap();
        let bucket = path_handle(&mut tx, &["b"]);
        tx.put(&bucket, b"k", b"v").unwrap();
        tx.commit().unwrap();
        let len = engine.size_bytes();
        engine.close().unwrap();
        len
    };

    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"BKDB\x01\x00\x01\xff\xff").unwrap();
    }

    let engine = Engine::open(&path, EngineOptions::default()).unwrap();
    assert_eq!(engine.size_bytes(), committed_len);
    assert_eq!(dump(&engine, &["b"]), vec![(b"k".to_vec(), b"v".to_vec())]);
    engine.close().unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), committed_len);
}

#[test]
fn garbage_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbage.db");
    std::fs::write(&path, b"this is not a bucketdb file at all").unwrap();

    assert!(matches!(
        Engine::open(&path, EngineOptions::default()),
        Err(StorageError::Corrupted { offset: 0, .. })
    ));
}

#[test]
fn missing_file_without_create_fails() {
    let dir = tempdir().unwrap();
    let options = EngineOptions::default().create_if_missing(false);
    assert!(matches!(
        Engine::open(&dir.path().join("absent.db"), options),
        Err(StorageError::Io(_))
    ));
}

#[test]
fn second_engine_on_same_file_is_locked() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    let engine = Engine::open(&path, EngineOptions::default()).unwrap();
    assert!(matches!(
        Engine::open(&path, EngineOptions::default()),
        Err(StorageError::Locked)
    ));
    engine.close().unwrap();
    assert!(Engine::open(&path, EngineOptions::default()).is_ok());
}

#[test]
fn reader_does_not_see_later_commit() {
    let engine = Engine::in_memory(EngineOptions::default());
    let mut tx = engine.begin(true).unwrap();
    let bucket = path_handle(&mut tx, &["b"]);
    tx.put(&bucket, b"k", b"old").unwrap();
    tx.commit().unwrap();

    let reader = engine.begin(false).unwrap();
    let before = reader.size_bytes();

    let mut tx = engine.begin(true).unwrap();
    let bucket = path_handle(&mut tx, &["b"]);
    tx.put(&bucket, b"k", b"new").unwrap();
    tx.put(&bucket, b"k2", b"added").unwrap();
    tx.commit().unwrap();

    let handle = reader.bucket(None, b"b").unwrap().unwrap();
    assert_eq!(reader.get(&handle, b"k").unwrap().unwrap().as_ref(), b"old");
    assert!(reader.get(&handle, b"k2").unwrap().is_none());
    assert_eq!(reader.size_bytes(), before);
    assert!(engine.size_bytes() > before);
}

#[test]
fn read_only_transaction_rejects_writes() {
    let engine = Engine::in_memory(EngineOptions::default());
    let mut tx = engine.begin(false).unwrap();
    assert!(matches!(
        tx.create_bucket_if_absent(None, b"b"),
        Err(StorageError::TxNotWritable)
    ));
    assert!(matches!(tx.commit(), Err(StorageError::TxNotWritable)));
    assert_eq!(engine.active_readers(), 0);
}

#[test]
fn empty_names_and_keys_are_rejected() {
    let engine = Engine::in_memory(EngineOptions::default());
    let mut tx = engine.begin(true).unwrap();
    assert!(matches!(
        tx.create_bucket_if_absent(None, b""),
        Err(StorageError::BucketNameRequired)
    ));
    assert!(matches!(
        tx.bucket(None, b""),
        Err(StorageError::BucketNameRequired)
    ));
    let bucket = path_handle(&mut tx, &["b"]);
    assert!(matches!(
        tx.put(&bucket, b"", b"v"),
        Err(StorageError::KeyRequired)
    ));
}

#[test]
fn backup_reopens_identically() {
    let dir = tempdir().unwrap();
    let source = Engine::in_memory(EngineOptions::default());

    let mut tx = source.begin(true).unwrap();
    for (path, count) in [(&["a"][..], 10), (&["a", "nested"][..], 5), (&["z"][..], 3)] {
        let bucket = path_handle(&mut tx, path);
        for i in 0..count {
            tx.put(&bucket, format!("k{i}").as_bytes(), format!("v{i}").as_bytes())
                .unwrap();
        }
    }
    path_handle(&mut tx, &["empty"]);
    tx.commit().unwrap();

    let backup_path = dir.path().join("backup.db");
    let reader = source.begin(false).unwrap();
    let mut file = std::fs::File::create(&backup_path).unwrap();
    let written = reader.copy_to(&mut file).unwrap();
    drop(file);
    assert_eq!(std::fs::metadata(&backup_path).unwrap().len(), written);

    let restored = Engine::open(&backup_path, EngineOptions::default()).unwrap();
    for path in [&["a"][..], &["a", "nested"][..], &["z"][..], &["empty"][..]] {
        assert_eq!(dump(&restored, path), dump(&source, path));
    }
}

#[test]
fn in_memory_backend_log_replays() {
    let engine = Engine::in_memory(EngineOptions::default());
    let mut tx = engine.begin(true).unwrap();
    let bucket = path_handle(&mut tx, &["b"]);
    tx.put(&bucket, b"k", b"v").unwrap();
    tx.commit().unwrap();

    let mut image = Vec::new();
    engine.begin(false).unwrap().copy_to(&mut image).unwrap();

    let backend = bucketdb_storage::InMemoryBackend::with_data(image.clone());
    assert_eq!(backend.size().unwrap(), image.len() as u64);
    let copy = Engine::with_backend(Box::new(backend), EngineOptions::default()).unwrap();
    assert_eq!(dump(&copy, &["b"]), vec![(b"k".to_vec(), b"v".to_vec())]);
}

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u8),
    Delete(u8),
    Commit,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..16, any::<u8>()).prop_map(|(k, v)| Op::Put(k, v)),
        2 => (0u8..16).prop_map(Op::Delete),
        1 => Just(Op::Commit),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn committed_state_matches_model_after_reopen(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.db");
        let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

        {
            let engine = Engine::open(&path, EngineOptions::default().sync_on_commit(false)).unwrap();
            let mut staged = model.clone();
            let mut tx = engine.begin(true).unwrap();
            let mut bucket = path_handle(&mut tx, &["model"]);
            for op in ops {
                match op {
                    Op::Put(k, v) => {
                        tx.put(&bucket, &[b'k', k], &[v]).unwrap();
                        staged.insert(vec![b'k', k], vec![v]);
                    }
                    Op::Delete(k) => {
                        tx.delete(&bucket, &[b'k', k]).unwrap();
                        staged.remove(&vec![b'k', k]);
                    }
                    Op::Commit => {
                        tx.commit().unwrap();
                        model = staged.clone();
                        tx = engine.begin(true).unwrap();
                        bucket = path_handle(&mut tx, &["model"]);
                    }
                }
            }
            tx.commit().unwrap();
            model = staged;
            engine.close().unwrap();
        }

        let engine = Engine::open(&path, EngineOptions::default()).unwrap();
        let expected: Vec<_> = model.into_iter().collect();
        prop_assert_eq!(dump(&engine, &["model"]), expected);
    }
}
