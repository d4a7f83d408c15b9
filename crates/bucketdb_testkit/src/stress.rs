//! Stress tests for bucketdb.
//!
//! These helpers drive a database under heavy load and concurrent access.

use crate::fixtures::numbered_doc;
use bucketdb_core::Db;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct keys.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            key_count: 1_000,
        }
    }
}

/// Runs one-shot puts, gets and deletes in turn on one thread.
pub fn stress_mixed_operations(db: &Db, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = (i % config.key_count).to_string();
        let result = match i % 3 {
            0 => db.put("stress", &key, &numbered_doc(i)),
            1 => match db.get("stress", &key) {
                Err(err) if err.is_no_such_key() => Ok(()),
                other => other.map(|_| ()),
            },
            _ => db.delete("stress", &key),
        };
        match result {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Runs one writer thread alongside `threads` scanning threads.
///
/// Every scan must see keys in strictly ascending order; a scan that does
/// not counts as a failure.
pub fn stress_writers_and_scans(db: &Db, config: &StressConfig) -> StressTestResult {
    db.put("stress", "seed", &numbered_doc(0))
        .expect("Failed to seed bucket");
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let scans_per_thread = (config.operations / config.threads.max(1)).max(1);

    let start = Instant::now();
    let writer = {
        let db = db.clone();
        let key_count = config.key_count;
        let operations = config.operations;
        thread::spawn(move || {
            for i in 0..operations {
                let _ = db.put("stress", &format!("{:08}", i % key_count), &numbered_doc(i));
            }
        })
    };

    let scanners: Vec<_> = (0..config.threads)
        .map(|_| {
            let db = db.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            thread::spawn(move || {
                for _ in 0..scans_per_thread {
                    let ordered = db.all("stress").is_ok_and(|stream| {
                        let keys: Vec<String> = stream.map(|pair| pair.key).collect();
                        keys.windows(2).all(|w| w[0] < w[1])
                    });
                    if ordered {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in scanners {
        handle.join().expect("Scanner thread panicked");
    }
    writer.join().expect("Writer thread panicked");

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
