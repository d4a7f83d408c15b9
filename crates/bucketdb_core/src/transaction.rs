//! Transactions over nested buckets of documents.

use crate::error::{CoreError, CoreResult};
use crate::path::BucketPath;
use crate::resolver;
use crate::stats::{DatabaseStats, PendingWrites};
use bucketdb_codec::{Document, DocumentCodec};
use bucketdb_storage::{BucketHandle, EngineTx};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back, explicitly or by close.
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        })
    }
}

/// Per-database settings and counters every transaction carries.
#[derive(Debug)]
pub(crate) struct TxContext {
    pub(crate) codec: DocumentCodec,
    pub(crate) stream_buffer: usize,
    pub(crate) stream_idle_timeout: Duration,
    pub(crate) stats: DatabaseStats,
}

/// One read-only or read-write transaction.
///
/// A transaction starts [`Active`](TransactionState::Active) and leaves that
/// state exactly once, through [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). [`close`](Self::close) is valid in every
/// state: it rolls back an active transaction and does nothing otherwise.
/// Dropping a transaction closes it.
///
/// Read-write transactions are serialized by the engine; read-only ones see
/// the store as it was when they began.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
    writable: bool,
    state: TransactionState,
    inner: Option<EngineTx>,
    pending: PendingWrites,
    ctx: Arc<TxContext>,
}

impl Transaction {
    pub(crate) fn new(inner: EngineTx, ctx: Arc<TxContext>) -> Self {
        ctx.stats.record_transaction_start();
        Self {
            id: inner.id(),
            writable: inner.is_writable(),
            state: TransactionState::Active,
            inner: Some(inner),
            pending: PendingWrites::default(),
            ctx,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns true for a read-write transaction.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Stores `doc` under `key` in `bucket`, creating missing buckets along
    /// the path. An existing value is replaced.
    ///
    /// # Errors
    ///
    /// [`CoreError::ReadOnlyViolation`] on a read-only transaction,
    /// [`CoreError::Encoding`] if the document cannot be encoded, or a
    /// storage error (for example an empty key, or `key` naming a bucket).
    pub fn put(&mut self, bucket: &str, key: &str, doc: &Document) -> CoreResult<()> {
        self.ensure_writable("put")?;
        let path = BucketPath::parse(bucket)?;
        let bytes = self.ctx.codec.encode(doc).map_err(CoreError::Encoding)?;

        let tx = self.engine_mut("put")?;
        let handle = resolver::resolve_or_create(tx, &path)?;
        tx.put(&handle, key.as_bytes(), &bytes)?;
        self.pending.puts += 1;
        self.pending.bytes += bytes.len() as u64;
        Ok(())
    }

    /// Reads the document under `key` in `bucket`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoSuchBucket`] if any segment of `bucket` is missing,
    /// [`CoreError::NoSuchKey`] if the bucket has no value under `key`, or
    /// [`CoreError::Decoding`] if the stored bytes are not a document.
    pub fn get(&self, bucket: &str, key: &str) -> CoreResult<Document> {
        let tx = self.engine("get")?;
        let path = BucketPath::parse(bucket)?;
        let handle = resolver::resolve(tx, &path)?;
        let bytes = tx
            .get(&handle, key.as_bytes())?
            .ok_or_else(|| CoreError::no_such_key(path.as_str(), key))?;
        let doc = self.ctx.codec.decode(&bytes).map_err(CoreError::Decoding)?;
        self.ctx.stats.record_read(bytes.len() as u64);
        Ok(doc)
    }

    /// Removes `key` from `bucket`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// [`CoreError::ReadOnlyViolation`] on a read-only transaction or
    /// [`CoreError::NoSuchBucket`] if the bucket does not exist.
    pub fn delete(&mut self, bucket: &str, key: &str) -> CoreResult<()> {
        self.ensure_writable("delete")?;
        let path = BucketPath::parse(bucket)?;

        let tx = self.engine_mut("delete")?;
        let handle = resolver::resolve(tx, &path)?;
        if tx.delete(&handle, key.as_bytes())? {
            self.pending.deletes += 1;
        }
        Ok(())
    }

    /// Commits every write atomically.
    ///
    /// # Errors
    ///
    /// [`CoreError::ReadOnlyViolation`] on a read-only transaction, which
    /// stays active; [`CoreError::InvalidTransactionState`] if the
    /// transaction already finished; [`CoreError::Commit`] if the engine
    /// fails, after which the transaction is rolled back and cannot be retried.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_writable("commit")?;
        let inner = self.take_inner("commit")?;
        match inner.commit() {
            Ok(()) => {
                self.state = TransactionState::Committed;
                self.ctx.stats.record_commit(self.pending);
                tracing::debug!(txid = self.id, "transaction committed");
                Ok(())
            }
            Err(err) => {
                self.state = TransactionState::RolledBack;
                self.ctx.stats.record_transaction_rollback();
                tracing::warn!(txid = self.id, error = %err, "commit failed");
                Err(CoreError::Commit(err))
            }
        }
    }

    /// Discards every write.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidTransactionState`] if the transaction already finished.
    pub fn rollback(&mut self) -> CoreResult<()> {
        let inner = self.take_inner("rollback")?;
        inner.rollback();
        self.state = TransactionState::RolledBack;
        self.ctx.stats.record_transaction_rollback();
        Ok(())
    }

    /// Rolls back if still active; otherwise does nothing.
    pub fn close(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.rollback();
            self.state = TransactionState::RolledBack;
            self.ctx.stats.record_transaction_rollback();
            tracing::debug!(txid = self.id, "closed active transaction");
        }
    }

    /// Lists every bucket, depth first: a parent before its children and
    /// siblings in byte order.
    ///
    /// Buckets whose names are not valid path segments (not UTF-8, or
    /// containing `.`) cannot be addressed and are left out.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidTransactionState`] if the transaction finished.
    pub fn buckets(&self) -> CoreResult<Vec<BucketPath>> {
        let tx = self.engine("list buckets")?;
        let mut out = Vec::new();
        collect_buckets(tx, None, &mut out)?;
        Ok(out)
    }

    /// Writes a consistent copy of the whole store, as this transaction sees
    /// it, to `sink`. The copy is itself an openable database file.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Fails if the transaction finished or writing to `sink` fails.
    pub fn backup(&self, sink: &mut dyn Write) -> CoreResult<u64> {
        let written = self.engine("backup")?.copy_to(sink)?;
        tracing::info!(txid = self.id, bytes = written, "backup written");
        Ok(written)
    }

    /// Size in bytes of the stored data this transaction sees.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidTransactionState`] if the transaction finished.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.engine("size")?.size_bytes())
    }

    pub(crate) fn engine(&self, operation: &'static str) -> CoreResult<&EngineTx> {
        self.inner
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state(operation, self.state))
    }

    pub(crate) fn context(&self) -> &Arc<TxContext> {
        &self.ctx
    }

    fn engine_mut(&mut self, operation: &'static str) -> CoreResult<&mut EngineTx> {
        let state = self.state;
        self.inner
            .as_mut()
            .ok_or_else(|| CoreError::invalid_state(operation, state))
    }

    fn take_inner(&mut self, operation: &'static str) -> CoreResult<EngineTx> {
        self.inner
            .take()
            .ok_or_else(|| CoreError::invalid_state(operation, self.state))
    }

    fn ensure_writable(&self, operation: &'static str) -> CoreResult<()> {
        if !self.is_active() {
            Err(CoreError::invalid_state(operation, self.state))
        } else if !self.writable {
            Err(CoreError::ReadOnlyViolation)
        } else {
            Ok(())
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.close();
    }
}

fn collect_buckets(
    tx: &EngineTx,
    parent: Option<(&BucketHandle, &BucketPath)>,
    out: &mut Vec<BucketPath>,
) -> CoreResult<()> {
    let parent_handle = parent.map(|(handle, _)| handle);
    for entry in tx.cursor(parent_handle)? {
        if !entry.is_bucket() {
            continue;
        }
        let path = std::str::from_utf8(&entry.key)
            .map_err(|_| CoreError::invalid_path(String::from_utf8_lossy(&entry.key), "not UTF-8"))
            .and_then(|name| match parent {
                None => BucketPath::root(name),
                Some((_, parent_path)) => parent_path.child(name),
            });
        let path = match path {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(error = %err, "skipping bucket that has no dot-path");
                continue;
            }
        };
        let Some(handle) = tx.bucket(parent_handle, &entry.key)? else {
            continue;
        };
        out.push(path.clone());
        collect_buckets(tx, Some((&handle, &path)), out)?;
    }
    Ok(())
}
