//! Canonical CBOR encoder for JSON values.

use crate::error::{CodecError, CodecResult};
use crate::MAX_DEPTH;
use serde_json::{Map, Number, Value};

/// Encode a JSON value to canonical CBOR bytes.
///
/// The output is deterministic:
/// - Object keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers use the shortest possible encoding
/// - Floats are always written as 64-bit
/// - No indefinite-length items
///
/// # Errors
///
/// Returns an error for non-finite numbers or nesting deeper than
/// [`MAX_DEPTH`].
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
    depth: usize,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new encoder with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            depth: 0,
        }
    }

    /// Encode a value.
    ///
    /// # Errors
    ///
    /// Fails on non-finite numbers or excessive nesting.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Number(n) => self.encode_number(n)?,
            Value::String(s) => self.encode_text(s),
            Value::Array(items) => self.encode_array(items)?,
            Value::Object(map) => self.encode_map(map)?,
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_number(&mut self, n: &Number) -> CodecResult<()> {
        if let Some(u) = n.as_u64() {
            self.encode_unsigned(0, u);
        } else if let Some(i) = n.as_i64() {
            // as_u64 failed, so i is negative; -(i+1) is in [0, 2^63-1]
            self.encode_unsigned(1, (-(i + 1)) as u64);
        } else {
            let f = n.as_f64().ok_or(CodecError::NonFiniteNumber)?;
            if !f.is_finite() {
                return Err(CodecError::NonFiniteNumber);
            }
            self.buffer.push(0xfb);
            self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn enter(&mut self) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::NestingTooDeep { max: MAX_DEPTH });
        }
        self.depth += 1;
        Ok(())
    }

    fn encode_array(&mut self, items: &[Value]) -> CodecResult<()> {
        self.enter()?;
        self.encode_unsigned(4, items.len() as u64);
        for item in items {
            self.encode(item)?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn encode_map(&mut self, map: &Map<String, Value>) -> CodecResult<()> {
        self.enter()?;

        let mut encoded: Vec<(Vec<u8>, &Value)> = map
            .iter()
            .map(|(key, value)| {
                let mut key_encoder = CanonicalEncoder::with_capacity(key.len() + 9);
                key_encoder.encode_text(key);
                (key_encoder.into_bytes(), value)
            })
            .collect();
        encoded.sort_by(|a, b| crate::decoder::compare_cbor_bytes(&a.0, &b.0));

        self.encode_unsigned(5, encoded.len() as u64);
        for (key, value) in encoded {
            self.buffer.extend_from_slice(&key);
            self.encode(value)?;
        }
        self.depth -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cbor(value: Value) -> Vec<u8> {
        to_canonical_cbor(&value).unwrap()
    }

    #[test]
    fn encode_scalars() {
        assert_eq!(cbor(json!(null)), vec![0xf6]);
        assert_eq!(cbor(json!(false)), vec![0xf4]);
        assert_eq!(cbor(json!(true)), vec![0xf5]);
    }

    #[test]
    fn encode_integers_shortest() {
        assert_eq!(cbor(json!(0)), vec![0x00]);
        assert_eq!(cbor(json!(23)), vec![0x17]);
        assert_eq!(cbor(json!(24)), vec![0x18, 24]);
        assert_eq!(cbor(json!(256)), vec![0x19, 0x01, 0x00]);
        assert_eq!(cbor(json!(65536)), vec![0x1a, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(
            cbor(json!(u64::MAX)),
            vec![0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn encode_negative_integers() {
        assert_eq!(cbor(json!(-1)), vec![0x20]);
        assert_eq!(cbor(json!(-24)), vec![0x37]);
        assert_eq!(cbor(json!(-25)), vec![0x38, 24]);
    }

    #[test]
    fn floats_are_always_double() {
        let mut expected = vec![0xfb];
        expected.extend_from_slice(&1.5f64.to_bits().to_be_bytes());
        assert_eq!(cbor(json!(1.5)), expected);

        let mut expected = vec![0xfb];
        expected.extend_from_slice(&2.0f64.to_bits().to_be_bytes());
        assert_eq!(cbor(json!(2.0)), expected);
    }

    #[test]
    fn encode_map_sorted_length_first() {
        let bytes = cbor(json!({"bb": 2, "a": 1}));
        assert_eq!(bytes, vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut value = json!(1);
        for _ in 0..=MAX_DEPTH {
            value = Value::Array(vec![value]);
        }
        assert_eq!(
            to_canonical_cbor(&value),
            Err(CodecError::NestingTooDeep { max: MAX_DEPTH })
        );
    }

    #[test]
    fn nesting_at_limit_is_accepted() {
        let mut value = json!(1);
        for _ in 0..MAX_DEPTH {
            value = Value::Array(vec![value]);
        }
        assert!(to_canonical_cbor(&value).is_ok());
    }
}
