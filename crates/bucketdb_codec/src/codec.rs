//! Compressed document framing.
//!
//! ```text
//! | uncompressed length u32 LE | zstd(canonical CBOR) |
//! ```

use crate::decoder::from_cbor;
use crate::document::{kind_of, Document};
use crate::encoder::to_canonical_cbor;
use crate::error::{CodecError, CodecResult};
use serde_json::Value;
use std::io::{Read, Write};

/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Largest CBOR body a stored value may expand to.
pub const MAX_DOCUMENT_BYTES: u64 = 256 * 1024 * 1024;

const PREFIX_SIZE: usize = 4;

/// Encodes documents to stored bytes and back.
///
/// # Example
///
/// ```
/// use bucketdb_codec::{Document, DocumentCodec};
/// use serde_json::json;
///
/// let codec = DocumentCodec::default();
/// let mut doc = Document::new();
/// doc.insert("key".into(), json!(7));
///
/// let bytes = codec.encode(&doc).unwrap();
/// assert_eq!(codec.decode(&bytes).unwrap(), doc);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentCodec {
    level: i32,
}

impl Default for DocumentCodec {
    fn default() -> Self {
        Self {
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl DocumentCodec {
    /// Creates a codec compressing at `level`.
    #[must_use]
    pub const fn new(level: i32) -> Self {
        Self { level }
    }

    /// Returns the compression level.
    #[must_use]
    pub const fn level(&self) -> i32 {
        self.level
    }

    /// Encodes a document.
    ///
    /// # Errors
    ///
    /// Fails on non-finite numbers, excessive nesting, or a body too large
    /// for the length prefix.
    pub fn encode(&self, doc: &Document) -> CodecResult<Vec<u8>> {
        let body = to_canonical_cbor(&Value::Object(doc.clone()))?;
        let len = u32::try_from(body.len())
            .ok()
            .filter(|len| u64::from(*len) <= MAX_DOCUMENT_BYTES)
            .ok_or(CodecError::SizeLimitExceeded {
                claimed: body.len() as u64,
                max_allowed: MAX_DOCUMENT_BYTES,
            })?;

        let mut out = Vec::with_capacity(PREFIX_SIZE + body.len() / 2);
        out.extend_from_slice(&len.to_le_bytes());
        let mut encoder = zstd::Encoder::new(&mut out, self.level)
            .map_err(|e| CodecError::compression(format!("zstd encoder: {e}")))?;
        encoder
            .write_all(&body)
            .map_err(|e| CodecError::compression(format!("zstd write: {e}")))?;
        encoder
            .finish()
            .map_err(|e| CodecError::compression(format!("zstd finish: {e}")))?;
        Ok(out)
    }

    /// Decodes stored bytes into a fresh document.
    ///
    /// # Errors
    ///
    /// Fails on empty or truncated input, decompression failure, a length
    /// mismatch, malformed CBOR, or a top-level value that is not an object.
    pub fn decode(&self, bytes: &[u8]) -> CodecResult<Document> {
        if bytes.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        if bytes.len() < PREFIX_SIZE {
            return Err(CodecError::TruncatedPrefix { len: bytes.len() });
        }
        let (prefix, compressed) = bytes.split_at(PREFIX_SIZE);
        let expected = u64::from(u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]));
        if expected > MAX_DOCUMENT_BYTES {
            return Err(CodecError::SizeLimitExceeded {
                claimed: expected,
                max_allowed: MAX_DOCUMENT_BYTES,
            });
        }

        let decoder = zstd::Decoder::new(compressed)
            .map_err(|e| CodecError::compression(format!("zstd decode: {e}")))?;
        let mut body = Vec::new();
        decoder
            .take(expected + 1)
            .read_to_end(&mut body)
            .map_err(|e| CodecError::compression(format!("zstd decode: {e}")))?;
        if body.len() as u64 != expected {
            return Err(CodecError::LengthMismatch {
                expected,
                actual: body.len() as u64,
            });
        }

        match from_cbor(&body)? {
            Value::Object(doc) => Ok(doc),
            other => Err(CodecError::NotADocument {
                found: kind_of(&other),
            }),
        }
    }
}

/// Encodes a document at the default compression level.
///
/// # Errors
///
/// See [`DocumentCodec::encode`].
pub fn encode_document(doc: &Document) -> CodecResult<Vec<u8>> {
    DocumentCodec::default().encode(doc)
}

/// Decodes a document encoded by any [`DocumentCodec`].
///
/// # Errors
///
/// See [`DocumentCodec::decode`].
pub fn decode_document(bytes: &[u8]) -> CodecResult<Document> {
    DocumentCodec::default().decode(bytes)
}
