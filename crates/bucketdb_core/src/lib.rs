//! # bucketdb core
//!
//! JSON documents stored under dot-addressed, nested buckets.
//!
//! This crate provides:
//! - [`Db`], the database handle, with one-shot operations and explicit
//!   transaction scopes
//! - [`Transaction`]: put, get, delete, bucket listing, backup, commit and
//!   rollback with an idempotent close
//! - [`Query`] and [`QueryStream`]: full, prefix and range scans, optionally
//!   filtered, streamed lazily from a background thread
//!
//! ```
//! use bucketdb_core::Db;
//! use serde_json::json;
//!
//! let db = Db::open_in_memory();
//! for key in ["1", "2", "10", "11"] {
//!     let doc = json!({"id": key}).as_object().cloned().unwrap_or_default();
//!     db.put("test.bucket", key, &doc)?;
//! }
//!
//! let keys: Vec<String> = db.prefix("test.bucket", "1")?.map(|pair| pair.key).collect();
//! assert_eq!(keys, ["1", "10", "11"]);
//! # Ok::<(), bucketdb_core::CoreError>(())
//! ```
//!
//! Keys are ordered byte by byte, so numeric-looking keys do not sort
//! numerically: `"10"` comes before `"2"`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod db;
mod error;
mod path;
mod query;
mod resolver;
mod stats;
mod transaction;

pub use config::Config;
pub use db::Db;
pub use error::{CoreError, CoreResult};
pub use path::BucketPath;
pub use query::{Query, QueryStream, ScanDiagnostic, ScanMode, SkipReason, StreamEnd};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use transaction::{Transaction, TransactionState};

pub use bucketdb_codec::{Document, Pair};
pub use bucketdb_filter::Filter;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
