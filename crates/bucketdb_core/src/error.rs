//! Error types for bucketdb core.

use crate::transaction::TransactionState;
use bucketdb_codec::CodecError;
use bucketdb_filter::ParseError;
use bucketdb_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in bucketdb core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A segment of the bucket path does not exist.
    #[error("no such bucket: {path}")]
    NoSuchBucket {
        /// The path that was being resolved.
        path: String,
    },

    /// The bucket exists but holds no value under the key.
    #[error("no such key: {key:?} in bucket {bucket}")]
    NoSuchKey {
        /// The bucket that was searched.
        bucket: String,
        /// The missing key.
        key: String,
    },

    /// A bucket path string is malformed.
    #[error("invalid bucket path {path:?}: {message}")]
    InvalidBucketPath {
        /// The offending path.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// A document could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(#[source] CodecError),

    /// A stored value could not be decoded.
    #[error("decoding error: {0}")]
    Decoding(#[source] CodecError),

    /// A write was attempted on a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnlyViolation,

    /// The engine failed to commit; the transaction is finished.
    #[error("commit failed: {0}")]
    Commit(#[source] StorageError),

    /// The operation is not valid in the transaction's current state.
    #[error("cannot {operation}: transaction is {state}")]
    InvalidTransactionState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the transaction was in.
        state: TransactionState,
    },

    /// A query stream stopped early because its consumer did not read for
    /// longer than the configured idle timeout. Pairs after the last one
    /// delivered were never sent.
    #[error("query stream over {bucket} abandoned after {idle_ms} ms without a read")]
    StreamAbandoned {
        /// The bucket being scanned.
        bucket: String,
        /// The idle timeout that expired, in milliseconds.
        idle_ms: u64,
    },

    /// A filter expression failed to parse.
    #[error("filter parse error: {0}")]
    FilterParse(#[from] ParseError),

    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,
}

impl CoreError {
    /// Creates a no such bucket error.
    pub fn no_such_bucket(path: impl Into<String>) -> Self {
        Self::NoSuchBucket { path: path.into() }
    }

    /// Creates a no such key error.
    pub fn no_such_key(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NoSuchKey {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Creates an invalid bucket path error.
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBucketPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid transaction state error.
    pub fn invalid_state(operation: &'static str, state: TransactionState) -> Self {
        Self::InvalidTransactionState { operation, state }
    }

    /// Returns true for [`CoreError::NoSuchKey`].
    #[must_use]
    pub fn is_no_such_key(&self) -> bool {
        matches!(self, Self::NoSuchKey { .. })
    }

    /// Returns true for [`CoreError::NoSuchBucket`].
    #[must_use]
    pub fn is_no_such_bucket(&self) -> bool {
        matches!(self, Self::NoSuchBucket { .. })
    }

    /// Maps an engine error from `begin`, turning a closed engine into
    /// [`CoreError::DatabaseClosed`].
    pub(crate) fn from_begin(err: StorageError) -> Self {
        match err {
            StorageError::Closed => Self::DatabaseClosed,
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_subject() {
        let err = CoreError::no_such_key("users.active", "42");
        assert_eq!(err.to_string(), "no such key: \"42\" in bucket users.active");
        assert!(err.is_no_such_key());

        let err = CoreError::invalid_state("commit", TransactionState::Committed);
        assert_eq!(err.to_string(), "cannot commit: transaction is committed");
    }

    #[test]
    fn closed_engine_maps_to_database_closed() {
        assert!(matches!(
            CoreError::from_begin(StorageError::Closed),
            CoreError::DatabaseClosed
        ));
        assert!(matches!(
            CoreError::from_begin(StorageError::Locked),
            CoreError::Storage(StorageError::Locked)
        ));
    }
}
