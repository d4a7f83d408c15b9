//! Canonical CBOR decoder for JSON values.

use crate::error::{CodecError, CodecResult};
use crate::MAX_DEPTH;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Decode one JSON value from canonical CBOR bytes.
///
/// The whole input must be consumed.
///
/// # Errors
///
/// Returns an error if the bytes are not canonical CBOR, use a type JSON
/// cannot hold (byte strings, tags, non-text keys), or leave trailing bytes.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            count: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// A canonical CBOR decoder.
///
/// Input that a [`CanonicalEncoder`](crate::CanonicalEncoder) would not
/// have produced is rejected.
#[derive(Debug)]
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

/// Maximum allowed element count for arrays and maps.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed string length.
const MAX_TEXT_LENGTH: u64 = 256 * 1024 * 1024;

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Decode the next value.
    ///
    /// # Errors
    ///
    /// Fails on malformed, non-canonical or unsupported input.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => Ok(Value::Number(Number::from(
                self.decode_unsigned(additional_info)?,
            ))),
            1 => {
                let n = self.decode_unsigned(additional_info)?;
                let n = i64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?;
                Ok(Value::Number(Number::from(-n - 1)))
            }
            2 => Err(CodecError::unsupported_type("byte string")),
            3 => self.decode_text(additional_info).map(Value::String),
            4 => self.decode_array(additional_info),
            5 => self.decode_map(additional_info),
            6 => Err(CodecError::unsupported_type("tag")),
            7 => self.decode_simple(additional_info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    /// Check if all bytes have been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    #[must_use]
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(CodecError::UnexpectedEof)?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        let non_canonical =
            || CodecError::invalid_structure("non-canonical: value could be encoded in fewer bytes");
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => {
                let byte = self.read_byte()?;
                if byte < 24 {
                    return Err(non_canonical());
                }
                Ok(u64::from(byte))
            }
            25 => {
                let bytes = self.read_bytes(2)?;
                let value = u16::from_be_bytes([bytes[0], bytes[1]]);
                if u8::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            26 => {
                let bytes = self.read_bytes(4)?;
                let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                if u16::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            27 => {
                let bytes = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                let value = u64::from_be_bytes(raw);
                if u32::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(value)
            }
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    fn decode_length(&mut self, additional_info: u8, max_allowed: u64) -> CodecResult<usize> {
        let claimed = self.decode_unsigned(additional_info)?;
        if claimed > max_allowed {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed,
            });
        }
        usize::try_from(claimed).map_err(|_| CodecError::SizeLimitExceeded {
            claimed,
            max_allowed,
        })
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<String> {
        let len = self.decode_length(additional_info, MAX_TEXT_LENGTH)?;
        let bytes = self.read_bytes(len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(text.to_string())
    }

    fn enter(&mut self) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::NestingTooDeep { max: MAX_DEPTH });
        }
        self.depth += 1;
        Ok(())
    }

    fn decode_array(&mut self, additional_info: u8) -> CodecResult<Value> {
        self.enter()?;
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        // Every item takes at least one byte.
        let mut items = Vec::with_capacity(len.min(self.data.len() - self.pos));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        self.depth -= 1;
        Ok(Value::Array(items))
    }

    fn decode_map(&mut self, additional_info: u8) -> CodecResult<Value> {
        self.enter()?;
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let mut map = Map::new();
        let mut prev_key: Option<&'a [u8]> = None;

        for _ in 0..len {
            let key_start = self.pos;
            let initial_byte = self.read_byte()?;
            if initial_byte >> 5 != 3 {
                return Err(CodecError::unsupported_type("non-text map key"));
            }
            let key = self.decode_text(initial_byte & 0x1f)?;
            let data: &'a [u8] = self.data;
            let key_bytes = &data[key_start..self.pos];

            if let Some(prev) = prev_key {
                if compare_cbor_bytes(prev, key_bytes) != Ordering::Less {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: map keys not in sorted order",
                    ));
                }
            }
            prev_key = Some(key_bytes);

            let value = self.decode()?;
            map.insert(key, value);
        }

        self.depth -= 1;
        Ok(Value::Object(map))
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            25 | 26 => Err(CodecError::invalid_structure(
                "non-canonical: floats must be 64-bit",
            )),
            27 => {
                let bytes = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                let f = f64::from_bits(u64::from_be_bytes(raw));
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or(CodecError::NonFiniteNumber)
            }
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            other => Err(CodecError::unsupported_type(format!("simple value {other}"))),
        }
    }
}

/// Compare two CBOR byte sequences for canonical ordering.
/// Uses length-first, then bytewise comparison.
pub(crate) fn compare_cbor_bytes(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
