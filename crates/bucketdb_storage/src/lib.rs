//! # bucketdb storage
//!
//! An embedded, transactional, ordered byte-keyed store with nested buckets.
//!
//! This crate is the engine underneath bucketdb. It knows nothing about
//! documents: buckets map byte keys to byte values or to further buckets.
//!
//! ## Model
//!
//! - One writer at a time; beginning a second write transaction blocks
//! - Any number of readers, each on an immutable snapshot taken at begin
//! - Every commit appends one checksummed record to a single log file
//! - Opening a file replays the log; a torn trailing record is discarded
//!
//! ## Example
//!
//! ```rust
//! use bucketdb_storage::{Engine, EngineOptions};
//!
//! let engine = Engine::in_memory(EngineOptions::default());
//!
//! let mut tx = engine.begin(true).unwrap();
//! let users = tx.create_bucket_if_absent(None, b"users").unwrap();
//! tx.put(&users, b"alice", b"{}").unwrap();
//! tx.commit().unwrap();
//!
//! let tx = engine.begin(false).unwrap();
//! let users = tx.bucket(None, b"users").unwrap().unwrap();
//! assert_eq!(tx.get(&users, b"alice").unwrap().as_deref(), Some(&b"{}"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod bucket;
mod cursor;
mod engine;
mod error;
mod file;
mod log;
mod memory;
mod options;
mod tx;

pub use backend::StorageBackend;
pub use cursor::{Cursor, CursorEntry};
pub use engine::Engine;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use log::{compute_crc32, RecordType, LOG_MAGIC, LOG_VERSION};
pub use memory::InMemoryBackend;
pub use options::EngineOptions;
pub use tx::{BucketHandle, EngineTx};
