//! Database handle.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::path::BucketPath;
use crate::query::QueryStream;
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::transaction::{Transaction, TxContext};
use bucketdb_codec::{Document, DocumentCodec};
use bucketdb_storage::Engine;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// The main database handle.
///
/// `Db` owns the storage engine. It hands out explicit transactions
/// ([`begin`](Self::begin), [`view`](Self::view), [`update`](Self::update))
/// and offers one-shot operations that each run in a transaction of their
/// own. One-shot calls are not atomic with each other; batch writes through
/// [`update`](Self::update) instead.
///
/// Clones share the same engine.
///
/// ```no_run
/// use bucketdb_core::Db;
/// use serde_json::json;
/// use std::path::Path;
///
/// let db = Db::open(Path::new("my.db"))?;
/// let doc = json!({"name": "alice"}).as_object().cloned().unwrap_or_default();
/// db.put("users.active", "alice", &doc)?;
/// assert_eq!(db.get("users.active", "alice")?, doc);
/// db.close()?;
/// # Ok::<(), bucketdb_core::CoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Db {
    engine: Engine,
    config: Config,
    ctx: Arc<TxContext>,
}

impl Db {
    /// Opens (or creates) the database file at `path` with default settings.
    ///
    /// # Errors
    ///
    /// Fails if the file is locked by another handle, is not a database
    /// file, or cannot be read.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens the database file at `path` with custom configuration.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open). With `create_if_missing` off a missing
    /// file is an error too.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let engine = Engine::open(path, config.engine_options())?;
        Ok(Self::with_engine(engine, config))
    }

    /// Creates an empty database that lives only in memory.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::open_in_memory_with_config(Config::default())
    }

    /// Creates an in-memory database with custom configuration.
    #[must_use]
    pub fn open_in_memory_with_config(config: Config) -> Self {
        Self::with_engine(Engine::in_memory(config.engine_options()), config)
    }

    fn with_engine(engine: Engine, config: Config) -> Self {
        let ctx = TxContext {
            codec: DocumentCodec::new(config.compression_level),
            stream_buffer: config.stream_buffer,
            stream_idle_timeout: config.stream_idle_timeout,
            stats: DatabaseStats::new(),
        };
        Self {
            engine,
            config,
            ctx: Arc::new(ctx),
        }
    }

    /// Returns database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying storage engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Begins a transaction. A writable transaction waits for the current
    /// writer, if any, to finish.
    ///
    /// # Errors
    ///
    /// [`CoreError::DatabaseClosed`] once the database has been closed.
    pub fn begin(&self, writable: bool) -> CoreResult<Transaction> {
        let inner = self.engine.begin(writable).map_err(CoreError::from_begin)?;
        Ok(Transaction::new(inner, Arc::clone(&self.ctx)))
    }

    /// Begins a read-only transaction.
    ///
    /// # Errors
    ///
    /// See [`begin`](Self::begin).
    pub fn begin_read(&self) -> CoreResult<Transaction> {
        self.begin(false)
    }

    /// Begins a read-write transaction.
    ///
    /// # Errors
    ///
    /// See [`begin`](Self::begin).
    pub fn begin_write(&self) -> CoreResult<Transaction> {
        self.begin(true)
    }

    /// Runs `f` in a read-only transaction, which is closed afterwards.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, or a failure to begin.
    pub fn view<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Transaction) -> CoreResult<T>,
    {
        let mut tx = self.begin_read()?;
        let result = f(&tx);
        tx.close();
        result
    }

    /// Runs `f` in a read-write transaction.
    ///
    /// If `f` returns `Ok` the transaction is committed (unless `f`
    /// finished it itself); if it returns `Err` the transaction is rolled back.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, or a failure to begin or commit.
    pub fn update<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction) -> CoreResult<T>,
    {
        let mut tx = self.begin_write()?;
        match f(&mut tx) {
            Ok(value) => {
                if tx.is_active() {
                    tx.commit()?;
                }
                Ok(value)
            }
            Err(err) => {
                tx.close();
                Err(err)
            }
        }
    }

    /// Stores `doc` under `key` in `bucket` in a transaction of its own.
    ///
    /// # Errors
    ///
    /// See [`Transaction::put`] and [`Transaction::commit`].
    pub fn put(&self, bucket: &str, key: &str, doc: &Document) -> CoreResult<()> {
        self.update(|tx| tx.put(bucket, key, doc))
    }

    /// Reads one document in a transaction of its own.
    ///
    /// # Errors
    ///
    /// See [`Transaction::get`].
    pub fn get(&self, bucket: &str, key: &str) -> CoreResult<Document> {
        self.view(|tx| tx.get(bucket, key))
    }

    /// Removes one key in a transaction of its own.
    ///
    /// # Errors
    ///
    /// See [`Transaction::delete`] and [`Transaction::commit`].
    pub fn delete(&self, bucket: &str, key: &str) -> CoreResult<()> {
        self.update(|tx| tx.delete(bucket, key))
    }

    /// Streams every pair in `bucket` from a fresh read transaction.
    ///
    /// # Errors
    ///
    /// See [`Transaction::query`].
    pub fn all(&self, bucket: &str) -> CoreResult<QueryStream> {
        self.begin_read()?.all(bucket)
    }

    /// Streams the pairs whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::query`].
    pub fn prefix(&self, bucket: &str, prefix: &str) -> CoreResult<QueryStream> {
        self.begin_read()?.prefix(bucket, prefix)
    }

    /// Streams the pairs with `start <= key <= end`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::query`].
    pub fn range(&self, bucket: &str, start: &str, end: &str) -> CoreResult<QueryStream> {
        self.begin_read()?.range(bucket, start, end)
    }

    /// Streams the documents in `bucket` matching `expression`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::find`].
    pub fn find(&self, bucket: &str, expression: &str) -> CoreResult<QueryStream> {
        self.begin_read()?.find(bucket, expression)
    }

    /// Streams the documents under `prefix` matching `expression`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::find`].
    pub fn find_prefix(
        &self,
        bucket: &str,
        prefix: &str,
        expression: &str,
    ) -> CoreResult<QueryStream> {
        self.begin_read()?.find_prefix(bucket, prefix, expression)
    }

    /// Streams the documents in `start..=end` matching `expression`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::find`].
    pub fn find_range(
        &self,
        bucket: &str,
        start: &str,
        end: &str,
        expression: &str,
    ) -> CoreResult<QueryStream> {
        self.begin_read()?.find_range(bucket, start, end, expression)
    }

    /// Lists every bucket, parents before children.
    ///
    /// # Errors
    ///
    /// See [`Transaction::buckets`].
    pub fn buckets(&self) -> CoreResult<Vec<BucketPath>> {
        self.view(Transaction::buckets)
    }

    /// Writes a consistent copy of the store to `sink`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::backup`].
    pub fn backup(&self, sink: &mut dyn Write) -> CoreResult<u64> {
        self.view(|tx| tx.backup(sink))
    }

    /// Writes a consistent copy of the store to a new file at `path` and
    /// syncs it.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be created, written or synced.
    pub fn backup_to_file(&self, path: &Path) -> CoreResult<u64> {
        let mut writer = BufWriter::new(File::create(path)?);
        let written = self.backup(&mut writer)?;
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()?;
        tracing::info!(path = %path.display(), bytes = written, "backup file written");
        Ok(written)
    }

    /// Current size of the stored data in bytes.
    ///
    /// # Errors
    ///
    /// [`CoreError::DatabaseClosed`] once the database has been closed.
    pub fn size(&self) -> CoreResult<u64> {
        self.view(Transaction::size)
    }

    /// Returns a snapshot of the operation counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// Closes the database. Live transactions keep their view, but new
    /// transactions and commits fail. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Fails if the final flush or sync fails.
    pub fn close(&self) -> CoreResult<()> {
        self.engine.close()?;
        Ok(())
    }

    /// Checks if the database is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }
}
