//! Background-produced query streams.
//!
//! A producer thread owns the query's transaction and walks its cursor,
//! handing decoded pairs to the consumer through a bounded channel. The
//! producer closes the transaction exactly once, in whichever of these
//! comes first:
//!
//! - the cursor is exhausted;
//! - the consumer cancels, or drops the stream;
//! - the channel stays full for `stream_idle_timeout`.
//!
//! While the channel is full the producer parks in short slices and
//! re-checks the cancellation flag; the consumer unparks it after every
//! receive and on cancel.
//!
//! The producer records how it stopped before closing the transaction, so a
//! consumer that reaches the end can tell a complete scan from one the
//! timeout cut short ([`QueryStream::finish`]).

use crate::error::{CoreError, CoreResult};
use crate::path::BucketPath;
use crate::query::scan::Scan;
use crate::transaction::{Transaction, TxContext};
use bucketdb_codec::{CodecError, Pair};
use bucketdb_filter::{EvalError, Filter};
use bytes::Bytes;
use std::fmt;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest the producer sleeps before re-checking for cancellation.
const PARK_SLICE: Duration = Duration::from_millis(50);

/// Why a scan skipped a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The key is not valid UTF-8.
    NonUtf8Key,
    /// The stored value is not a document.
    Decode(CodecError),
    /// The filter could not be evaluated against the document.
    Eval(EvalError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonUtf8Key => f.write_str("key is not UTF-8"),
            Self::Decode(err) => write!(f, "decode failed: {err}"),
            Self::Eval(err) => write!(f, "filter failed: {err}"),
        }
    }
}

/// A pair a scan skipped instead of failing the whole query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDiagnostic {
    /// The bucket being scanned.
    pub bucket: String,
    /// The skipped key, lossily decoded.
    pub key: String,
    /// What went wrong.
    pub reason: SkipReason,
}

/// Where skipped pairs are reported.
#[derive(Clone)]
struct Reporter {
    bucket: BucketPath,
    ctx: Arc<TxContext>,
    diagnostics: Option<Sender<ScanDiagnostic>>,
}

impl Reporter {
    fn skip(&self, key: String, reason: SkipReason) {
        match &reason {
            SkipReason::Eval(err) => {
                tracing::debug!(bucket = %self.bucket, key = %key, error = %err, "filter skipped pair");
            }
            other => {
                tracing::warn!(bucket = %self.bucket, key = %key, reason = %other, "skipping unreadable pair");
            }
        }
        self.ctx.stats.record_skipped();
        if let Some(diagnostics) = &self.diagnostics {
            // A receiver that hung up only loses diagnostics.
            let _ = diagnostics.send(ScanDiagnostic {
                bucket: self.bucket.to_string(),
                key,
                reason,
            });
        }
    }

    /// Evaluates `filter`; errors count as a non-match.
    fn admits(&self, filter: &Filter, pair: &Pair) -> bool {
        match filter.matches(&pair.value) {
            Ok(matched) => matched,
            Err(err) => {
                self.skip(pair.key.clone(), SkipReason::Eval(err));
                false
            }
        }
    }
}

/// How a query stream's producer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Every matching pair was sent.
    Exhausted,
    /// The consumer cancelled or dropped the stream.
    Cancelled,
    /// The consumer stopped reading for longer than the idle timeout; the
    /// rest of the scan was never sent.
    Abandoned,
}

impl StreamEnd {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Exhausted => 1,
            Self::Cancelled => 2,
            Self::Abandoned => 3,
        }
    }

    const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Exhausted),
            2 => Some(Self::Cancelled),
            3 => Some(Self::Abandoned),
            _ => None,
        }
    }
}

struct Producer {
    tx: Transaction,
    filter: Option<Filter>,
    reporter: Reporter,
    sender: SyncSender<Pair>,
    cancelled: Arc<AtomicBool>,
    outcome: Arc<AtomicU8>,
    idle_timeout: Duration,
}

impl Producer {
    fn run(mut self, scan: Scan) {
        let mut delivered = 0u64;
        let mut end = StreamEnd::Exhausted;
        for (key, value) in scan {
            if self.cancelled.load(Ordering::Acquire) {
                end = StreamEnd::Cancelled;
                break;
            }
            let Some(pair) = self.prepare(&key, &value) else {
                continue;
            };
            match self.hand_off(pair) {
                Ok(()) => delivered += 1,
                Err(stop) => {
                    end = stop;
                    break;
                }
            }
        }

        let txid = self.tx.id();
        self.outcome.store(end.to_u8(), Ordering::Release);
        self.tx.close();
        match end {
            StreamEnd::Abandoned => tracing::warn!(
                txid,
                bucket = %self.reporter.bucket,
                delivered,
                timeout_ms = self.idle_timeout.as_millis(),
                "query consumer stopped reading; closed its transaction"
            ),
            _ => tracing::debug!(
                txid,
                bucket = %self.reporter.bucket,
                delivered,
                cancelled = end == StreamEnd::Cancelled,
                "query stream finished"
            ),
        }
    }

    fn prepare(&self, key: &Bytes, value: &Bytes) -> Option<Pair> {
        let Ok(key) = std::str::from_utf8(key) else {
            self.reporter
                .skip(String::from_utf8_lossy(key).into_owned(), SkipReason::NonUtf8Key);
            return None;
        };
        let doc = match self.tx.context().codec.decode(value) {
            Ok(doc) => doc,
            Err(err) => {
                self.reporter.skip(key.to_string(), SkipReason::Decode(err));
                return None;
            }
        };
        let pair = Pair::new(key, doc);
        match &self.filter {
            Some(filter) if !self.reporter.admits(filter, &pair) => None,
            _ => Some(pair),
        }
    }

    fn hand_off(&self, mut pair: Pair) -> Result<(), StreamEnd> {
        let mut full_since: Option<Instant> = None;
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                return Err(StreamEnd::Cancelled);
            }
            match self.sender.try_send(pair) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(StreamEnd::Cancelled),
                Err(TrySendError::Full(returned)) => {
                    pair = returned;
                    let waited = full_since.get_or_insert_with(Instant::now).elapsed();
                    if waited >= self.idle_timeout {
                        return Err(StreamEnd::Abandoned);
                    }
                    thread::park_timeout((self.idle_timeout - waited).min(PARK_SLICE));
                }
            }
        }
    }
}

/// A lazy, finite, non-restartable sequence of [`Pair`]s in key order.
///
/// The stream owns its transaction. Reading it to the end, calling
/// [`cancel`](Self::cancel), or dropping it all close that transaction, and
/// once any of them returns the transaction is closed.
pub struct QueryStream {
    receiver: Option<Receiver<Pair>>,
    producer: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    outcome: Arc<AtomicU8>,
    stages: Vec<Filter>,
    reporter: Reporter,
}

impl fmt::Debug for QueryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryStream")
            .field("bucket", &self.reporter.bucket)
            .field("stages", &self.stages.len())
            .field("finished", &self.receiver.is_none())
            .field("end", &self.end_reason())
            .finish_non_exhaustive()
    }
}

impl QueryStream {
    pub(crate) fn spawn(
        tx: Transaction,
        bucket: BucketPath,
        scan: Scan,
        filter: Option<Filter>,
        diagnostics: Option<Sender<ScanDiagnostic>>,
    ) -> CoreResult<Self> {
        let ctx = Arc::clone(tx.context());
        let (sender, receiver) = mpsc::sync_channel(ctx.stream_buffer.max(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let outcome = Arc::new(AtomicU8::new(0));
        let reporter = Reporter {
            bucket,
            ctx: Arc::clone(&ctx),
            diagnostics,
        };
        let producer = Producer {
            tx,
            filter,
            reporter: reporter.clone(),
            sender,
            cancelled: Arc::clone(&cancelled),
            outcome: Arc::clone(&outcome),
            idle_timeout: ctx.stream_idle_timeout,
        };
        let handle = thread::Builder::new()
            .name("bucketdb-scan".into())
            .spawn(move || producer.run(scan))?;

        Ok(Self {
            receiver: Some(receiver),
            producer: Some(handle),
            cancelled,
            outcome,
            stages: Vec::new(),
            reporter,
        })
    }

    /// The bucket being scanned.
    #[must_use]
    pub fn bucket(&self) -> &BucketPath {
        &self.reporter.bucket
    }

    /// How the producer stopped, or `None` while it is still scanning.
    #[must_use]
    pub fn end_reason(&self) -> Option<StreamEnd> {
        StreamEnd::from_u8(self.outcome.load(Ordering::Acquire))
    }

    /// Returns true when the idle timeout cut the scan short. Once `next`
    /// has returned `None` this is final.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.end_reason() == Some(StreamEnd::Abandoned)
    }

    /// Checks that the stream delivered the whole scan. Call it after
    /// reading to the end.
    ///
    /// # Errors
    ///
    /// [`CoreError::StreamAbandoned`] if the producer gave up because the
    /// consumer stopped reading.
    pub fn finish(&self) -> CoreResult<()> {
        if self.is_truncated() {
            return Err(CoreError::StreamAbandoned {
                bucket: self.reporter.bucket.to_string(),
                idle_ms: u64::try_from(self.reporter.ctx.stream_idle_timeout.as_millis())
                    .unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    /// Adds a filter stage: only pairs for which `expression` evaluates to
    /// `true` are yielded. Pairs the expression cannot be evaluated against
    /// are skipped.
    ///
    /// # Errors
    ///
    /// [`CoreError::FilterParse`](crate::CoreError::FilterParse) if the
    /// expression is malformed; the stream is cancelled.
    pub fn filtered(mut self, expression: &str) -> CoreResult<Self> {
        self.stages.push(Filter::parse(expression)?);
        Ok(self)
    }

    /// Stops the scan and closes its transaction. Later calls to `next`
    /// return `None`. Calling it again does nothing.
    pub fn cancel(&mut self) {
        if self.receiver.is_none() && self.producer.is_none() {
            return;
        }
        self.cancelled.store(true, Ordering::Release);
        self.receiver = None;
        self.join_producer();
    }

    fn join_producer(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::warn!(bucket = %self.reporter.bucket, "query producer panicked");
            }
        }
    }
}

impl Iterator for QueryStream {
    type Item = Pair;

    fn next(&mut self) -> Option<Pair> {
        loop {
            let received = self.receiver.as_ref()?.recv();
            if let Some(handle) = &self.producer {
                handle.thread().unpark();
            }
            let Ok(pair) = received else {
                self.receiver = None;
                self.join_producer();
                return None;
            };
            if self
                .stages
                .iter()
                .all(|stage| self.reporter.admits(stage, &pair))
            {
                self.reporter.ctx.stats.record_streamed();
                return Some(pair);
            }
        }
    }
}

impl FusedIterator for QueryStream {}

impl Drop for QueryStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
