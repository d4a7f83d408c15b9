//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The commit log is corrupted.
    #[error("storage corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Log offset of the offending record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A log record failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Log offset of the record.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// The engine has been closed.
    #[error("storage is closed")]
    Closed,

    /// Another handle holds the exclusive file lock.
    #[error("database file is locked by another handle")]
    Locked,

    /// A bucket name was empty.
    #[error("bucket name required")]
    BucketNameRequired,

    /// A key was empty.
    #[error("key required")]
    KeyRequired,

    /// A bucket handle does not point at a live bucket in this transaction.
    #[error("bucket not found")]
    BucketNotFound,

    /// A value operation hit a bucket, or a bucket operation hit a value.
    #[error("incompatible value: key holds a {found}")]
    IncompatibleValue {
        /// What the key actually holds ("bucket" or "value").
        found: &'static str,
    },

    /// A write was attempted on a read-only transaction.
    #[error("transaction is not writable")]
    TxNotWritable,

    /// A single record would not fit the length field.
    #[error("record too large: {size} bytes")]
    RecordTooLarge {
        /// Encoded payload size.
        size: usize,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }
}
