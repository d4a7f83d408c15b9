//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use bucketdb_core::{Config, Db, Document, Pair};
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test database with automatic cleanup.
pub struct TestDb {
    /// The database instance.
    pub db: Db,
    path: Option<PathBuf>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestDb {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates an in-memory test database with custom configuration.
    pub fn memory_with_config(config: Config) -> Self {
        Self {
            db: Db::open_in_memory_with_config(config),
            path: None,
            _temp_dir: None,
        }
    }

    /// Creates a new file-based test database in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("test.db");
        let db = Db::open(&path).expect("Failed to open file database");
        Self {
            db,
            path: Some(path),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Closes and reopens a file-based database, as after a restart.
    ///
    /// # Panics
    ///
    /// Panics for an in-memory database.
    pub fn reopen(&mut self) {
        let path = self.path.clone().expect("Only file databases can be reopened");
        self.db.close().expect("Failed to close database");
        self.db = Db::open(&path).expect("Failed to reopen database");
    }
}

impl std::ops::Deref for TestDb {
    type Target = Db;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Db) -> R,
{
    let test_db = TestDb::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Db, &Path) -> R,
{
    let test_db = TestDb::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, path)
}

/// The document [`put_n`] stores under key `i`: `{"key": i}`.
pub fn numbered_doc(i: usize) -> Document {
    let mut doc = Document::new();
    doc.insert("key".to_string(), json!(i));
    doc
}

/// Stores `{"key": i}` under key `i.to_string()` for `i` in `0..n`, in one
/// transaction.
pub fn put_n(db: &Db, bucket: &str, n: usize) {
    db.update(|tx| {
        for i in 0..n {
            tx.put(bucket, &i.to_string(), &numbered_doc(i))?;
        }
        Ok(())
    })
    .expect("Failed to put documents");
}

/// Collects the keys of a pair stream, in order.
pub fn collect_keys(pairs: impl IntoIterator<Item = Pair>) -> Vec<String> {
    pairs.into_iter().map(|pair| pair.key).collect()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A database holding `count` numbered documents in `test.bucket`.
    pub fn populated_database(count: usize) -> TestDb {
        let test_db = TestDb::memory();
        put_n(&test_db.db, "test.bucket", count);
        test_db
    }

    /// A database with one document in each of the given buckets.
    pub fn bucket_tree(paths: &[&str]) -> TestDb {
        let test_db = TestDb::memory();
        test_db
            .db
            .update(|tx| {
                for (i, path) in paths.iter().enumerate() {
                    tx.put(path, "doc", &numbered_doc(i))?;
                }
                Ok(())
            })
            .expect("Failed to build bucket tree");
        test_db
    }
}
