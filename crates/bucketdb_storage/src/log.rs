//! Commit log records.
//!
//! Every committed write transaction becomes one record:
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload | crc32 (4) |
//! ```
//!
//! All integers are little-endian and the CRC covers everything before it.
//! The payload of a [`RecordType::Batch`] record is
//!
//! ```text
//! | txid u64 | op count u32 | op* |
//! op   = tag u8 | path | [key] | [value]
//! path = segment count u16 | (len u32 | bytes)*
//! ```

use crate::backend::StorageBackend;
use crate::bucket::{descend_mut, BucketNode};
use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use std::sync::Arc;

/// Magic bytes opening every record.
pub const LOG_MAGIC: [u8; 4] = *b"BKDB";

/// Current record format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

const OP_CREATE_BUCKET: u8 = 1;
const OP_PUT: u8 = 2;
const OP_DELETE: u8 = 3;

/// Kind of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// The writes of one committed transaction.
    Batch = 1,
}

impl RecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Batch),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One mutation inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LogOp {
    /// Create every missing bucket along `path`.
    CreateBucket { path: Vec<Bytes> },
    /// Store `value` under `key` in the bucket at `path`.
    Put {
        path: Vec<Bytes>,
        key: Bytes,
        value: Bytes,
    },
    /// Remove `key` from the bucket at `path`.
    Delete { path: Vec<Bytes>, key: Bytes },
}

impl LogOp {
    /// Applies the operation to a tree.
    pub(crate) fn apply(&self, root: &mut Arc<BucketNode>) -> StorageResult<()> {
        match self {
            LogOp::CreateBucket { path } => {
                for depth in 0..path.len() {
                    let parent = descend_mut(root, &path[..depth])?;
                    parent.ensure_child(&path[depth])?;
                }
                Ok(())
            }
            LogOp::Put { path, key, value } => {
                descend_mut(root, path)?.put_value(key.clone(), value.clone())
            }
            LogOp::Delete { path, key } => descend_mut(root, path)?.delete_value(key).map(|_| ()),
        }
    }
}

/// A decoded batch record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Batch {
    pub(crate) txid: u64,
    pub(crate) ops: Vec<LogOp>,
}

impl Batch {
    /// Serializes the batch into a complete record, envelope included.
    pub(crate) fn encode_record(&self) -> StorageResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| StorageError::RecordTooLarge { size: payload.len() })?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&LOG_MAGIC);
        data.extend_from_slice(&LOG_VERSION.to_le_bytes());
        data.push(RecordType::Batch.as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);
        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }

    fn encode_payload(&self) -> StorageResult<Vec<u8>> {
        let count = u32::try_from(self.ops.len())
            .map_err(|_| StorageError::RecordTooLarge { size: self.ops.len() })?;

        let mut buf = Vec::new();
        buf.extend_from_slice(&self.txid.to_le_bytes());
        buf.extend_from_slice(&count.to_le_bytes());
        for op in &self.ops {
            match op {
                LogOp::CreateBucket { path } => {
                    buf.push(OP_CREATE_BUCKET);
                    write_path(&mut buf, path)?;
                }
                LogOp::Put { path, key, value } => {
                    buf.push(OP_PUT);
                    write_path(&mut buf, path)?;
                    write_bytes(&mut buf, key)?;
                    write_bytes(&mut buf, value)?;
                }
                LogOp::Delete { path, key } => {
                    buf.push(OP_DELETE);
                    write_path(&mut buf, path)?;
                    write_bytes(&mut buf, key)?;
                }
            }
        }
        Ok(buf)
    }

    fn decode_payload(offset: u64, payload: &[u8]) -> StorageResult<Self> {
        let mut reader = PayloadReader {
            offset,
            data: payload,
            pos: 0,
        };

        let txid = reader.u64()?;
        let count = reader.u32()?;
        let mut ops = Vec::new();
        for _ in 0..count {
            let op = match reader.u8()? {
                OP_CREATE_BUCKET => LogOp::CreateBucket {
                    path: reader.path()?,
                },
                OP_PUT => LogOp::Put {
                    path: reader.path()?,
                    key: reader.bytes()?,
                    value: reader.bytes()?,
                },
                OP_DELETE => LogOp::Delete {
                    path: reader.path()?,
                    key: reader.bytes()?,
                },
                tag => {
                    return Err(StorageError::corrupted(
                        offset,
                        format!("unknown operation tag {tag}"),
                    ))
                }
            };
            ops.push(op);
        }

        if reader.pos != payload.len() {
            return Err(StorageError::corrupted(
                offset,
                format!(
                    "trailing bytes in batch record: expected {} bytes, got {}",
                    reader.pos,
                    payload.len()
                ),
            ));
        }
        Ok(Self { txid, ops })
    }
}

fn write_path(buf: &mut Vec<u8>, path: &[Bytes]) -> StorageResult<()> {
    let count =
        u16::try_from(path.len()).map_err(|_| StorageError::RecordTooLarge { size: path.len() })?;
    buf.extend_from_slice(&count.to_le_bytes());
    for segment in path {
        write_bytes(buf, segment)?;
    }
    Ok(())
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> StorageResult<()> {
    let len =
        u32::try_from(bytes.len()).map_err(|_| StorageError::RecordTooLarge { size: bytes.len() })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

struct PayloadReader<'a> {
    offset: u64,
    data: &'a [u8],
    pos: usize,
}

impl PayloadReader<'_> {
    fn take(&mut self, n: usize) -> StorageResult<&[u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(StorageError::corrupted(
                self.offset,
                "unexpected end of payload",
            )),
        }
    }

    fn u8(&mut self) -> StorageResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> StorageResult<u16> {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(raw))
    }

    fn u32(&mut self) -> StorageResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> StorageResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn bytes(&mut self) -> StorageResult<Bytes> {
        let len = self.u32()? as usize;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    fn path(&mut self) -> StorageResult<Vec<Bytes>> {
        let count = self.u16()?;
        (0..count).map(|_| self.bytes()).collect()
    }
}

/// Result of scanning a log.
#[derive(Debug)]
pub(crate) struct Replay {
    /// Number of bytes holding complete, valid records.
    pub(crate) valid_len: u64,
    /// Highest transaction id seen.
    pub(crate) last_txid: u64,
    /// Whether an incomplete trailing record was found after `valid_len`.
    pub(crate) torn_tail: bool,
}

/// Reads every record of `backend` in order and hands each batch to `apply`.
///
/// A trailing record that is cut short is reported through
/// [`Replay::torn_tail`] instead of failing. Anything else that does not
/// parse is corruption.
pub(crate) fn replay<F>(backend: &dyn StorageBackend, mut apply: F) -> StorageResult<Replay>
where
    F: FnMut(Batch) -> StorageResult<()>,
{
    let size = backend.size()?;
    let mut offset = 0u64;
    let mut last_txid = 0u64;

    loop {
        let remaining = size - offset;
        if remaining == 0 {
            return Ok(Replay {
                valid_len: offset,
                last_txid,
                torn_tail: false,
            });
        }
        if remaining < HEADER_SIZE as u64 {
            break;
        }

        let header = backend.read_at(offset, HEADER_SIZE)?;
        if header[0..4] != LOG_MAGIC {
            return Err(StorageError::corrupted(offset, "bad record magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != LOG_VERSION {
            return Err(StorageError::corrupted(
                offset,
                format!("unsupported record version {version}"),
            ));
        }
        let record_type = RecordType::from_byte(header[6]).ok_or_else(|| {
            StorageError::corrupted(offset, format!("unknown record type {}", header[6]))
        })?;
        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        let total = (HEADER_SIZE + payload_len + CRC_SIZE) as u64;
        if remaining < total {
            break;
        }

        let body = backend.read_at(offset + HEADER_SIZE as u64, payload_len + CRC_SIZE)?;
        let (payload, crc_bytes) = body.split_at(payload_len);
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut hasher = Crc32::new();
        hasher.update(&header);
        hasher.update(payload);
        let actual = hasher.finish();
        if actual != expected {
            return Err(StorageError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }

        match record_type {
            RecordType::Batch => {
                let batch = Batch::decode_payload(offset, payload)?;
                last_txid = last_txid.max(batch.txid);
                apply(batch)?;
            }
        }
        offset += total;
    }

    Ok(Replay {
        valid_len: offset,
        last_txid,
        torn_tail: true,
    })
}

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Incremental CRC32 (IEEE).
struct Crc32(u32);

impl Crc32 {
    fn new() -> Self {
        Self(0xFFFF_FFFF)
    }

    fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let index = ((self.0 ^ u32::from(byte)) & 0xFF) as usize;
            self.0 = (self.0 >> 8) ^ CRC32_TABLE[index];
        }
    }

    fn finish(&self) -> u32 {
        !self.0
    }
}

/// Computes the CRC32 checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(data);
    hasher.finish()
}
