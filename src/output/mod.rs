//! Output module for crawl statistics and progress
//!
//! This module handles:
//! - Live atomic counters shared by all workers
//! - Periodic progress logging while a crawl runs
//! - Printing a final summary of the counters

pub mod progress;
pub mod stats;

pub use progress::{report_progress, QueueGauge, DEFAULT_PROGRESS_INTERVAL};
pub use stats::{print_statistics, Stats, StatsSnapshot};
