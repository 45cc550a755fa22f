//! Live crawl statistics
//!
//! This module provides the atomic counters updated by crawl workers and
//! read concurrently by the progress reporter and by callers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate crawl counters
///
/// Each counter only ever increases. `processed` is bumped when a worker
/// dequeues an address, before any work; `succeeded` and `failed` are bumped
/// once the address is classified, so at every observation point
/// `processed >= succeeded + failed`.
#[derive(Debug, Default)]
pub struct Stats {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a worker dequeued an address
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Records that an address completed the pipeline
    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a fetch failure or a missing fetcher
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Takes a point-in-time copy of all counters
    ///
    /// The classification counters are read before `processed`, so the
    /// snapshot never shows more classified addresses than processed ones.
    pub fn snapshot(&self) -> StatsSnapshot {
        let succeeded = self.succeeded();
        let failed = self.failed();
        let processed = self.processed();
        StatsSnapshot {
            processed,
            succeeded,
            failed,
        }
    }
}

/// A copy of the crawl counters at one moment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Addresses dequeued by a worker
    pub processed: u64,

    /// Addresses that reached the callback through the full pipeline
    pub succeeded: u64,

    /// Addresses that failed to fetch or had no fetcher
    pub failed: u64,
}

impl StatsSnapshot {
    /// Addresses dequeued but not (yet) classified
    pub fn unclassified(&self) -> u64 {
        self.processed.saturating_sub(self.succeeded + self.failed)
    }

    /// Share of processed addresses that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.processed as f64) * 100.0
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} succeeded, {} failed",
            self.processed, self.succeeded, self.failed
        )
    }
}

/// Prints statistics to stderr in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StatsSnapshot) {
    eprintln!("=== Crawl Statistics ===\n");

    eprintln!("  Processed: {}", stats.processed);
    eprintln!("  Succeeded: {}", stats.succeeded);
    eprintln!("  Failed: {}", stats.failed);
    if stats.unclassified() > 0 {
        eprintln!("  Unclassified: {}", stats.unclassified());
    }
    eprintln!();

    eprintln!(
        "Success Rate: {:.1}% ({} / {} pages)",
        stats.success_rate(),
        stats.succeeded,
        stats.processed
    );
}
