//! Engine transactions.

use crate::backend::StorageBackend;
use crate::bucket::{self, descend_mut, BucketNode, Visit};
use crate::cursor::Cursor;
use crate::engine::{Shared, Snapshot};
use crate::error::{StorageError, StorageResult};
use crate::log::{Batch, LogOp};
use bytes::Bytes;
use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Records in a backup are cut once their payload passes this size.
const BACKUP_CHUNK_BYTES: usize = 1 << 20;

/// Addresses one bucket inside a transaction.
///
/// A handle is just the bucket's path from the root; it does not pin
/// anything and may be reused across operations of the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketHandle {
    path: Vec<Bytes>,
}

impl BucketHandle {
    /// The chain of bucket names from the root to this bucket.
    #[must_use]
    pub fn path(&self) -> &[Bytes] {
        &self.path
    }

    /// The bucket's own name.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        self.path.last().map_or(&[][..], |name| name.as_ref())
    }

    fn child(parent: Option<&BucketHandle>, name: &[u8]) -> Self {
        let mut path = parent.map(|p| p.path.clone()).unwrap_or_default();
        path.push(Bytes::copy_from_slice(name));
        Self { path }
    }
}

/// Keeps the writer slot or the reader count for as long as a transaction lives.
pub(crate) struct TxSlot {
    shared: Arc<Shared>,
    writer: bool,
}

impl TxSlot {
    pub(crate) fn writer(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            writer: true,
        }
    }

    pub(crate) fn reader(shared: Arc<Shared>) -> Self {
        shared.readers.fetch_add(1, Ordering::SeqCst);
        Self {
            shared,
            writer: false,
        }
    }
}

impl Drop for TxSlot {
    fn drop(&mut self) {
        if self.writer {
            self.shared.release_writer();
        } else {
            self.shared.readers.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// One transaction against an [`Engine`](crate::Engine).
///
/// Reads see the snapshot taken at begin plus, for a writable transaction,
/// its own uncommitted writes. Dropping the transaction without calling
/// [`commit`](Self::commit) discards every write.
pub struct EngineTx {
    id: u64,
    writable: bool,
    root: Arc<BucketNode>,
    base_len: u64,
    ops: Vec<LogOp>,
    slot: TxSlot,
}

impl std::fmt::Debug for EngineTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineTx")
            .field("id", &self.id)
            .field("writable", &self.writable)
            .field("pending_ops", &self.ops.len())
            .finish_non_exhaustive()
    }
}

impl EngineTx {
    pub(crate) fn new(id: u64, writable: bool, snapshot: Snapshot, slot: TxSlot) -> Self {
        Self {
            id,
            writable,
            root: snapshot.root,
            base_len: snapshot.log_len,
            ops: Vec::new(),
            slot,
        }
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns true for a read-write transaction.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Looks up the bucket `name` under `parent` (the root when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNameRequired`] for an empty name, or
    /// [`StorageError::BucketNotFound`] if `parent` no longer exists.
    pub fn bucket(
        &self,
        parent: Option<&BucketHandle>,
        name: &[u8],
    ) -> StorageResult<Option<BucketHandle>> {
        if name.is_empty() {
            return Err(StorageError::BucketNameRequired);
        }
        let node = self.node(parent)?;
        Ok(node
            .child(name)
            .map(|_| BucketHandle::child(parent, name)))
    }

    /// Returns the bucket `name` under `parent`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Fails on a read-only transaction, an empty name, a missing parent, or
    /// when `name` already holds a value.
    pub fn create_bucket_if_absent(
        &mut self,
        parent: Option<&BucketHandle>,
        name: &[u8],
    ) -> StorageResult<BucketHandle> {
        self.ensure_writable()?;
        if name.is_empty() {
            return Err(StorageError::BucketNameRequired);
        }
        let parent_path = parent.map_or(&[][..], |p| p.path());
        let created = descend_mut(&mut self.root, parent_path)?
            .ensure_child(&Bytes::copy_from_slice(name))?;
        let handle = BucketHandle::child(parent, name);
        if created {
            self.ops.push(LogOp::CreateBucket {
                path: handle.path.clone(),
            });
        }
        Ok(handle)
    }

    /// Reads the value under `key`. Nested buckets read as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket is gone.
    pub fn get(&self, bucket: &BucketHandle, key: &[u8]) -> StorageResult<Option<Bytes>> {
        Ok(self.node(Some(bucket))?.value(key).cloned())
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Fails on a read-only transaction, an empty key, a missing bucket, or
    /// when `key` names a nested bucket.
    pub fn put(&mut self, bucket: &BucketHandle, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.ensure_writable()?;
        if key.is_empty() {
            return Err(StorageError::KeyRequired);
        }
        let key = Bytes::copy_from_slice(key);
        let value = Bytes::copy_from_slice(value);
        descend_mut(&mut self.root, bucket.path())?.put_value(key.clone(), value.clone())?;
        self.ops.push(LogOp::Put {
            path: bucket.path.clone(),
            key,
            value,
        });
        Ok(())
    }

    /// Removes `key`, returning true if a value was there. Removing an
    /// absent key is not an error.
    ///
    /// # Errors
    ///
    /// Fails on a read-only transaction, a missing bucket, or when `key`
    /// names a nested bucket.
    pub fn delete(&mut self, bucket: &BucketHandle, key: &[u8]) -> StorageResult<bool> {
        self.ensure_writable()?;
        let removed = descend_mut(&mut self.root, bucket.path())?.delete_value(key)?;
        if removed {
            self.ops.push(LogOp::Delete {
                path: bucket.path.clone(),
                key: Bytes::copy_from_slice(key),
            });
        }
        Ok(removed)
    }

    /// Opens a cursor over `bucket` (the root when `None`).
    ///
    /// The cursor reads the bucket as it is now; later writes in this
    /// transaction are not visible through it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket is gone.
    pub fn cursor(&self, bucket: Option<&BucketHandle>) -> StorageResult<Cursor> {
        Ok(Cursor::new(self.node(bucket)?))
    }

    /// Makes the transaction's writes durable and visible to new transactions.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TxNotWritable`] for a read-only transaction,
    /// [`StorageError::Closed`] if the engine was closed, or the append,
    /// flush or sync failure. Nothing is published when commit fails.
    pub fn commit(mut self) -> StorageResult<()> {
        self.ensure_writable()?;
        if self.ops.is_empty() {
            tracing::debug!(txid = self.id, "committed empty transaction");
            return Ok(());
        }

        let batch = Batch {
            txid: self.id,
            ops: std::mem::take(&mut self.ops),
        };
        let record = batch.encode_record()?;
        let shared = Arc::clone(&self.slot.shared);

        let mut log = shared.log.lock();
        let backend = log.as_mut().ok_or(StorageError::Closed)?;
        let before = backend.size()?;
        if let Err(err) = append_durably(backend.as_mut(), &record, shared.options.sync_on_commit)
        {
            if let Err(cleanup) = backend.truncate(before) {
                tracing::warn!(txid = self.id, error = %cleanup, "failed to cut partial commit record");
            }
            return Err(err);
        }
        let log_len = backend.size()?;

        *shared.state.write() = Snapshot {
            root: Arc::clone(&self.root),
            log_len,
        };
        drop(log);
        tracing::debug!(txid = self.id, log_len, "committed transaction");
        Ok(())
    }

    /// Discards the transaction and all of its writes.
    pub fn rollback(self) {
        tracing::debug!(txid = self.id, writable = self.writable, "rolled back transaction");
    }

    /// Writes a self-contained log recreating this transaction's view.
    ///
    /// The output is itself an openable database file. Returns the number
    /// of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `sink` fails.
    pub fn copy_to(&self, sink: &mut dyn Write) -> StorageResult<u64> {
        let mut out = BackupWriter {
            sink,
            txid: self.id,
            pending: Vec::new(),
            pending_bytes: 0,
            written: 0,
        };
        bucket::walk(&self.root, &mut |visit| match visit {
            Visit::Bucket(path) => out.push(
                LogOp::CreateBucket {
                    path: path.to_vec(),
                },
                path.iter().map(|s| s.len() + 4).sum(),
            ),
            Visit::Value { path, key, value } => out.push(
                LogOp::Put {
                    path: path.to_vec(),
                    key: key.clone(),
                    value: value.clone(),
                },
                key.len() + value.len() + 8,
            ),
        })?;
        out.flush_batch()?;
        out.sink.flush()?;

        tracing::info!(txid = self.id, bytes = out.written, "copied snapshot");
        Ok(out.written)
    }

    /// Size in bytes of the committed log this transaction's snapshot is built from.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.base_len
    }

    fn node(&self, bucket: Option<&BucketHandle>) -> StorageResult<Arc<BucketNode>> {
        let path = bucket.map_or(&[][..], |b| b.path());
        self.root.descend(path).ok_or(StorageError::BucketNotFound)
    }

    fn ensure_writable(&self) -> StorageResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(StorageError::TxNotWritable)
        }
    }
}

fn append_durably(backend: &mut dyn StorageBackend, record: &[u8], sync: bool) -> StorageResult<()> {
    backend.append(record)?;
    backend.flush()?;
    if sync {
        backend.sync()?;
    }
    Ok(())
}

/// Accumulates backup operations and cuts them into batch records.
struct BackupWriter<'a> {
    sink: &'a mut dyn Write,
    txid: u64,
    pending: Vec<LogOp>,
    pending_bytes: usize,
    written: u64,
}

impl BackupWriter<'_> {
    fn push(&mut self, op: LogOp, approx_len: usize) -> StorageResult<()> {
        self.pending.push(op);
        self.pending_bytes += approx_len;
        if self.pending_bytes >= BACKUP_CHUNK_BYTES {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn flush_batch(&mut self) -> StorageResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = Batch {
            txid: self.txid,
            ops: std::mem::take(&mut self.pending),
        };
        let record = batch.encode_record()?;
        self.sink.write_all(&record)?;
        self.written += record.len() as u64;
        self.pending_bytes = 0;
        Ok(())
    }
}
