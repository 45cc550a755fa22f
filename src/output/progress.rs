//! Periodic progress reporting
//!
//! The reporter is purely observational: it logs the counters on an interval
//! and exits when the crawl's cancellation scope fires.

use crate::output::stats::Stats;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Interval used when progress reporting is enabled without one
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(30);

/// Source of the queue gauges included in each report
pub trait QueueGauge: Send + Sync {
    /// Addresses waiting in the queue
    fn queued(&self) -> usize;

    /// Workers currently running the pipeline
    fn active(&self) -> usize;
}

/// Logs a progress line every `interval` until `cancel` fires
pub async fn report_progress(
    stats: Arc<Stats>,
    gauge: Arc<dyn QueueGauge>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let start_time = Instant::now();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = stats.snapshot();
                let elapsed = start_time.elapsed();
                let rate = snapshot.processed as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
                tracing::info!(
                    "Progress: {}, {} queued, {} active, {:.2} pages/sec",
                    snapshot,
                    gauge.queued(),
                    gauge.active(),
                    rate
                );
            }
        }
    }

    tracing::debug!("Progress reporter stopped");
}
