//! The storage engine handle.

use crate::backend::StorageBackend;
use crate::bucket::BucketNode;
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use crate::log::{self, Batch};
use crate::memory::InMemoryBackend;
use crate::options::EngineOptions;
use crate::tx::{EngineTx, TxSlot};
use parking_lot::{Condvar, Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// The committed state every new transaction starts from.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) root: Arc<BucketNode>,
    pub(crate) log_len: u64,
}

pub(crate) struct Shared {
    pub(crate) options: EngineOptions,
    pub(crate) log: Mutex<Option<Box<dyn StorageBackend>>>,
    pub(crate) state: RwLock<Snapshot>,
    writer: Mutex<bool>,
    writer_released: Condvar,
    pub(crate) readers: AtomicUsize,
    next_txid: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn release_writer(&self) {
        *self.writer.lock() = false;
        self.writer_released.notify_one();
    }
}

/// An open store.
///
/// `Engine` is a cheap, clonable handle; all clones share one log and one
/// committed state. Transactions keep the engine internals alive, so an
/// `EngineTx` stays usable for reads even after every `Engine` clone has
/// been dropped.
///
/// # Concurrency
///
/// Write transactions are serialized: [`begin(true)`](Self::begin) blocks
/// while another write transaction is live. Read transactions never block
/// and see the state committed before they began.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.shared.options)
            .field("closed", &self.is_closed())
            .field("active_readers", &self.active_readers())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Opens the database file at `path`, replaying its log.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if the file is held by another
    /// engine, [`StorageError::Corrupted`] or
    /// [`StorageError::ChecksumMismatch`] if the log is damaged, or an I/O
    /// error (including a missing file when `create_if_missing` is off).
    pub fn open(path: &Path, options: EngineOptions) -> StorageResult<Self> {
        let backend = FileBackend::open(path, options.create_if_missing)?;
        let engine = Self::with_backend(Box::new(backend), options)?;
        tracing::info!(path = %path.display(), "opened database");
        Ok(engine)
    }

    /// Creates an empty engine that lives only in memory.
    #[must_use]
    pub fn in_memory(options: EngineOptions) -> Self {
        let shared = Shared {
            options,
            log: Mutex::new(Some(Box::new(InMemoryBackend::new()))),
            state: RwLock::new(Snapshot {
                root: Arc::default(),
                log_len: 0,
            }),
            writer: Mutex::new(false),
            writer_released: Condvar::new(),
            readers: AtomicUsize::new(0),
            next_txid: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Opens an engine over an arbitrary backend, replaying whatever log it holds.
    ///
    /// # Errors
    ///
    /// Fails if the log is corrupted or cannot be read.
    pub fn with_backend(
        mut backend: Box<dyn StorageBackend>,
        options: EngineOptions,
    ) -> StorageResult<Self> {
        let mut root = Arc::new(BucketNode::default());
        let mut batches = 0usize;
        let replay = log::replay(backend.as_ref(), |batch: Batch| {
            for op in &batch.ops {
                op.apply(&mut root)?;
            }
            batches += 1;
            Ok(())
        })?;

        if replay.torn_tail {
            tracing::warn!(
                valid_len = replay.valid_len,
                "discarding incomplete trailing log record"
            );
            backend.truncate(replay.valid_len)?;
        }
        tracing::debug!(batches, log_len = replay.valid_len, "replayed commit log");

        let shared = Shared {
            options,
            log: Mutex::new(Some(backend)),
            state: RwLock::new(Snapshot {
                root,
                log_len: replay.valid_len,
            }),
            writer: Mutex::new(false),
            writer_released: Condvar::new(),
            readers: AtomicUsize::new(0),
            next_txid: AtomicU64::new(replay.last_txid + 1),
            closed: AtomicBool::new(false),
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Begins a transaction.
    ///
    /// A writable transaction waits until no other writable transaction is
    /// live.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Closed`] if the engine has been closed,
    /// including while waiting for the writer slot.
    pub fn begin(&self, writable: bool) -> StorageResult<EngineTx> {
        self.ensure_open()?;
        let id = self.shared.next_txid.fetch_add(1, Ordering::SeqCst);

        let slot = if writable {
            let mut active = self.shared.writer.lock();
            while *active {
                self.ensure_open()?;
                self.shared.writer_released.wait(&mut active);
            }
            self.ensure_open()?;
            *active = true;
            TxSlot::writer(Arc::clone(&self.shared))
        } else {
            TxSlot::reader(Arc::clone(&self.shared))
        };

        let snapshot = self.shared.state.read().clone();
        tracing::debug!(txid = id, writable, "began transaction");
        Ok(EngineTx::new(id, writable, snapshot, slot))
    }

    /// Number of live read-only transactions.
    #[must_use]
    pub fn active_readers(&self) -> usize {
        self.shared.readers.load(Ordering::SeqCst)
    }

    /// Whether a write transaction is currently live.
    #[must_use]
    pub fn writer_active(&self) -> bool {
        *self.shared.writer.lock()
    }

    /// Length of the committed log in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.shared.state.read().log_len
    }

    /// Returns the options the engine was opened with.
    #[must_use]
    pub fn options(&self) -> EngineOptions {
        self.shared.options
    }

    /// Returns true once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Flushes and syncs the log, then releases the file.
    ///
    /// Live read transactions keep their snapshots; later `begin` calls and
    /// commits fail with [`StorageError::Closed`]. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or sync fails. The engine is
    /// closed regardless.
    pub fn close(&self) -> StorageResult<()> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        drop(self.shared.writer.lock());
        self.shared.writer_released.notify_all();

        let backend = self.shared.log.lock().take();
        if let Some(mut backend) = backend {
            backend.flush()?;
            backend.sync()?;
        }
        tracing::info!("closed database");
        Ok(())
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.is_closed() {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn second_writer_waits_for_first() {
        let engine = Engine::in_memory(EngineOptions::default());
        let mut first = engine.begin(true).unwrap();
        assert!(engine.writer_active());

        let other = engine.clone();
        let waiter = thread::spawn(move || {
            let tx = other.begin(true).unwrap();
            let bucket = tx.bucket(None, b"b").unwrap();
            bucket.is_some()
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        first.create_bucket_if_absent(None, b"b").unwrap();
        first.commit().unwrap();

        assert!(waiter.join().unwrap());
        assert!(!engine.writer_active());
    }

    #[test]
    fn readers_are_counted() {
        let engine = Engine::in_memory(EngineOptions::default());
        let a = engine.begin(false).unwrap();
        let b = engine.begin(false).unwrap();
        assert_eq!(engine.active_readers(), 2);
        drop(a);
        b.rollback();
        assert_eq!(engine.active_readers(), 0);
    }

    #[test]
    fn close_rejects_new_transactions() {
        let engine = Engine::in_memory(EngineOptions::default());
        let reader = engine.begin(false).unwrap();
        engine.close().unwrap();
        engine.close().unwrap();

        assert!(matches!(engine.begin(false), Err(StorageError::Closed)));
        assert!(reader.bucket(None, b"x").unwrap().is_none());
    }

    #[test]
    fn close_wakes_waiting_writer() {
        let engine = Engine::in_memory(EngineOptions::default());
        let held = engine.begin(true).unwrap();

        let other = engine.clone();
        let waiter = thread::spawn(move || other.begin(true).map(|_| ()));
        thread::sleep(Duration::from_millis(50));
        engine.close().unwrap();

        assert!(matches!(waiter.join().unwrap(), Err(StorageError::Closed)));
        drop(held);
    }
}
