//! Streaming queries over one bucket.
//!
//! A [`Query`] names a bucket, a [`ScanMode`] and optionally a filter.
//! Running it consumes the transaction: the returned [`QueryStream`] keeps
//! the transaction open while it is read and closes it when it ends.
//!
//! ```
//! use bucketdb_core::{Db, Query};
//! use serde_json::json;
//!
//! let db = Db::open_in_memory();
//! db.update(|tx| {
//!     for i in 0..100 {
//!         let doc = json!({"key": i}).as_object().cloned().unwrap_or_default();
//!         tx.put("numbers", &i.to_string(), &doc)?;
//!     }
//!     Ok(())
//! })?;
//!
//! let query = Query::all("numbers").filter_expr(".key >= 98")?;
//! let keys: Vec<String> = db.begin_read()?.query(query)?.map(|p| p.key).collect();
//! assert_eq!(keys, ["98", "99"]);
//! # Ok::<(), bucketdb_core::CoreError>(())
//! ```

mod scan;
mod stream;

pub use scan::ScanMode;
pub use stream::{QueryStream, ScanDiagnostic, SkipReason, StreamEnd};

use crate::error::CoreResult;
use crate::path::BucketPath;
use crate::resolver;
use crate::transaction::Transaction;
use bucketdb_filter::Filter;
use scan::Scan;
use std::sync::mpsc::Sender;

/// A scan over one bucket, optionally filtered.
#[derive(Debug, Clone)]
pub struct Query {
    bucket: String,
    mode: ScanMode,
    filter: Option<Filter>,
    diagnostics: Option<Sender<ScanDiagnostic>>,
}

impl Query {
    /// Every pair in `bucket`.
    pub fn all(bucket: impl Into<String>) -> Self {
        Self::new(bucket.into(), ScanMode::All)
    }

    /// Pairs whose key starts with `prefix`.
    pub fn prefix(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::new(bucket.into(), ScanMode::Prefix(prefix.into()))
    }

    /// Pairs whose key lies in `start..=end`.
    pub fn range(
        bucket: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self::new(
            bucket.into(),
            ScanMode::Range {
                start: start.into(),
                end: end.into(),
            },
        )
    }

    fn new(bucket: String, mode: ScanMode) -> Self {
        Self {
            bucket,
            mode,
            filter: None,
            diagnostics: None,
        }
    }

    /// Keeps only documents for which `filter` is `true`.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Parses `expression` and keeps only documents for which it is `true`.
    ///
    /// # Errors
    ///
    /// [`CoreError::FilterParse`](crate::CoreError::FilterParse) for a
    /// malformed expression.
    pub fn filter_expr(self, expression: &str) -> CoreResult<Self> {
        Ok(self.filter(Filter::parse(expression)?))
    }

    /// Reports every skipped pair to `sender` as well as to the log.
    #[must_use]
    pub fn diagnostics(mut self, sender: Sender<ScanDiagnostic>) -> Self {
        self.diagnostics = Some(sender);
        self
    }

    /// The bucket path as given.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The scan mode.
    #[must_use]
    pub fn mode(&self) -> &ScanMode {
        &self.mode
    }
}

impl Transaction {
    /// Runs `query`, handing this transaction to the returned stream.
    ///
    /// The bucket is resolved before anything is streamed.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidTransactionState`](crate::CoreError::InvalidTransactionState)
    /// if the transaction finished, [`CoreError::NoSuchBucket`](crate::CoreError::NoSuchBucket)
    /// if the bucket does not exist, or an I/O error if the producer thread
    /// cannot be started. The transaction is closed on every error.
    pub fn query(self, query: Query) -> CoreResult<QueryStream> {
        let (cursor, path) = {
            let tx = self.engine("query")?;
            let path = BucketPath::parse(&query.bucket)?;
            let handle = resolver::resolve(tx, &path)?;
            (tx.cursor(Some(&handle))?, path)
        };
        self.context().stats.record_scan();
        tracing::debug!(txid = self.id(), bucket = %path, mode = ?query.mode, "starting query");
        let scan = Scan::new(cursor, query.mode);
        QueryStream::spawn(self, path, scan, query.filter, query.diagnostics)
    }

    /// Streams every pair in `bucket`.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn all(self, bucket: &str) -> CoreResult<QueryStream> {
        self.query(Query::all(bucket))
    }

    /// Streams the pairs in `bucket` whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn prefix(self, bucket: &str, prefix: &str) -> CoreResult<QueryStream> {
        self.query(Query::prefix(bucket, prefix))
    }

    /// Streams the pairs in `bucket` with `start <= key <= end`.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn range(self, bucket: &str, start: &str, end: &str) -> CoreResult<QueryStream> {
        self.query(Query::range(bucket, start, end))
    }

    /// Streams the documents in `bucket` matching `expression`.
    ///
    /// # Errors
    ///
    /// [`CoreError::FilterParse`](crate::CoreError::FilterParse) before any
    /// scanning, otherwise see [`query`](Self::query).
    pub fn find(self, bucket: &str, expression: &str) -> CoreResult<QueryStream> {
        self.query(Query::all(bucket).filter_expr(expression)?)
    }

    /// Streams the documents under `prefix` matching `expression`.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub fn find_prefix(
        self,
        bucket: &str,
        prefix: &str,
        expression: &str,
    ) -> CoreResult<QueryStream> {
        self.query(Query::prefix(bucket, prefix).filter_expr(expression)?)
    }

    /// Streams the documents in `start..=end` matching `expression`.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub fn find_range(
        self,
        bucket: &str,
        start: &str,
        end: &str,
        expression: &str,
    ) -> CoreResult<QueryStream> {
        self.query(Query::range(bucket, start, end).filter_expr(expression)?)
    }
}
