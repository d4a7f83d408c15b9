//! # bucketdb codec
//!
//! Document encoding for bucketdb.
//!
//! A document is a JSON object ([`Document`]). It is stored as canonical
//! CBOR compressed with zstd and prefixed with its uncompressed length, so:
//!
//! - Identical documents produce identical bytes
//! - Integers stay integers and floats stay floats across a round trip
//! - An empty stored value is an error, never an empty document
//!
//! ## Canonical CBOR Rules
//!
//! - Map keys are text, sorted by encoded form (length-first, then bytewise)
//! - Integers use shortest encoding
//! - Floats are always 64-bit and finite
//! - No indefinite-length items, byte strings or tags
//!
//! ## Usage
//!
//! ```
//! use bucketdb_codec::{decode_document, encode_document, Document};
//! use serde_json::json;
//!
//! let mut doc = Document::new();
//! doc.insert("name".into(), json!("alice"));
//! doc.insert("score".into(), json!(9.5));
//!
//! let bytes = encode_document(&doc).unwrap();
//! assert_eq!(decode_document(&bytes).unwrap(), doc);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod decoder;
mod document;
mod encoder;
mod error;

pub use codec::{
    decode_document, encode_document, DocumentCodec, DEFAULT_COMPRESSION_LEVEL,
    MAX_DOCUMENT_BYTES,
};
pub use decoder::{from_cbor, CanonicalDecoder};
pub use document::{Document, Pair};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};

/// Deepest array/object nesting the codec accepts.
pub const MAX_DEPTH: usize = 128;
