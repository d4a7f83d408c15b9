//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A number was NaN or infinite.
    #[error("non-finite numbers cannot be encoded")]
    NonFiniteNumber,

    /// Arrays and objects nest deeper than the codec allows.
    #[error("nesting deeper than {max} levels")]
    NestingTooDeep {
        /// The configured maximum depth.
        max: usize,
    },

    /// Nothing to decode.
    #[error("empty input")]
    EmptyInput,

    /// The length prefix is missing or cut short.
    #[error("input too short for length prefix: {len} bytes")]
    TruncatedPrefix {
        /// Number of bytes available.
        len: usize,
    },

    /// Compression or decompression failed.
    #[error("compression failed: {message}")]
    Compression {
        /// Description of the failure.
        message: String,
    },

    /// The decompressed body does not match its length prefix.
    #[error("length mismatch: prefix says {expected} bytes, body has {actual}")]
    LengthMismatch {
        /// Length recorded in the prefix.
        expected: u64,
        /// Length actually decompressed.
        actual: u64,
    },

    /// Indefinite-length items are forbidden.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes remain after the top-level value.
    #[error("{count} trailing bytes after value")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },

    /// Invalid CBOR structure.
    #[error("invalid CBOR structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// Unsupported CBOR type.
    #[error("unsupported CBOR type: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// Integer outside the JSON integer range.
    #[error("integer overflow")]
    IntegerOverflow,

    /// A declared size is larger than the codec accepts.
    #[error("size limit exceeded: claimed {claimed}, max allowed {max_allowed}")]
    SizeLimitExceeded {
        /// The size claimed by the input.
        claimed: u64,
        /// The maximum size accepted.
        max_allowed: u64,
    },

    /// The top-level value is not an object.
    #[error("not a document: top-level value is {found}")]
    NotADocument {
        /// Kind of value found instead.
        found: &'static str,
    },
}

impl CodecError {
    /// Create a compression error.
    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }
}
