//! Database statistics.
//!
//! Counters are bumped by transactions and query streams and can be read at
//! any time through [`Db::stats`](crate::Db::stats).

use std::sync::atomic::{AtomicU64, Ordering};

/// Live database counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
    pairs_streamed: AtomicU64,
    pairs_skipped: AtomicU64,
    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
}

impl DatabaseStats {
    /// Creates a zeroed stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_streamed(&self) {
        self.pairs_streamed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.pairs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self, pending: PendingWrites) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
        self.writes.fetch_add(pending.puts, Ordering::Relaxed);
        self.bytes_written.fetch_add(pending.bytes, Ordering::Relaxed);
        self.deletes.fetch_add(pending.deletes, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            reads: load(&self.reads),
            writes: load(&self.writes),
            deletes: load(&self.deletes),
            scans: load(&self.scans),
            pairs_streamed: load(&self.pairs_streamed),
            pairs_skipped: load(&self.pairs_skipped),
            transactions_started: load(&self.transactions_started),
            transactions_committed: load(&self.transactions_committed),
            transactions_rolled_back: load(&self.transactions_rolled_back),
            bytes_written: load(&self.bytes_written),
            bytes_read: load(&self.bytes_read),
        }
    }
}

/// Writes made by a transaction that has not committed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PendingWrites {
    pub(crate) puts: u64,
    pub(crate) bytes: u64,
    pub(crate) deletes: u64,
}

/// A point-in-time copy of [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Successful `get` calls.
    pub reads: u64,
    /// Puts in committed transactions.
    pub writes: u64,
    /// Values removed by committed transactions.
    pub deletes: u64,
    /// Query streams started.
    pub scans: u64,
    /// Pairs handed to query consumers.
    pub pairs_streamed: u64,
    /// Pairs a scan skipped because they could not be decoded or evaluated.
    pub pairs_skipped: u64,
    /// Transactions begun.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions rolled back, explicitly or by close.
    pub transactions_rolled_back: u64,
    /// Encoded bytes stored by committed puts.
    pub bytes_written: u64,
    /// Encoded bytes read by `get`.
    pub bytes_read: u64,
}
