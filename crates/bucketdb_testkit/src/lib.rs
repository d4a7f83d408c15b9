//! # bucketdb testkit
//!
//! Test utilities for bucketdb.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use bucketdb_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     put_n(db, "test.bucket", 10);
//!     assert_eq!(collect_keys(db.prefix("test.bucket", "1").unwrap()), ["1"]);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
