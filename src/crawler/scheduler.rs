//! Scheduling primitives for the crawl frontier
//!
//! This module handles:
//! - The seen-address ledger that guarantees at-most-once scheduling
//! - The bounded work queue shared by all crawl workers
//! - Outstanding-work accounting used to detect an idle crawl
//! - The idle monitor that ends a crawl once no work remains

use crate::output::QueueGauge;
use crate::SpiderError;
use dashmap::DashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Queue capacity used when none (or zero) is configured
pub const DEFAULT_QUEUE_SIZE: usize = 10_000;

/// Every canonical address ever admitted
///
/// Entries are never removed, so an address is scheduled at most once for the
/// lifetime of the crawler, across crawls.
#[derive(Debug, Default)]
pub struct Ledger {
    seen: DashSet<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an address, returning true if it was not already present
    ///
    /// The check and the insert are one atomic step, so concurrent callers
    /// racing on the same address see exactly one `true`.
    pub fn insert(&self, canonical: &str) -> bool {
        self.seen.insert(canonical.to_string())
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.seen.contains(canonical)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Bounded FIFO of canonical addresses awaiting processing
///
/// Besides the channel itself the queue tracks `outstanding` work: addresses
/// queued plus addresses a worker has taken but not finished. The count is
/// raised before an address enters the channel and lowered only after its
/// pipeline completes, so there is no window in which a dequeued address is
/// invisible to the idle check.
pub struct WorkQueue {
    sender: mpsc::Sender<String>,
    receiver: Mutex<mpsc::Receiver<String>>,
    outstanding: AtomicUsize,
    active: AtomicUsize,
}

impl WorkQueue {
    /// Creates a queue; a zero capacity falls back to `DEFAULT_QUEUE_SIZE`
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_QUEUE_SIZE
        } else {
            capacity
        };
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            sender,
            receiver: Mutex::new(receiver),
            outstanding: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Addresses waiting in the channel
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueues without waiting; returns false if the queue is full
    pub fn try_push(&self, address: String) -> bool {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        match self.sender.try_send(address) {
            Ok(()) => true,
            Err(_) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                false
            }
        }
    }

    /// Enqueues, waiting for space until `cancel` fires
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The address is queued
    /// * `Err(SpiderError::Cancelled)` - Cancellation fired while waiting
    pub async fn push(&self, address: String, cancel: &CancellationToken) -> Result<(), SpiderError> {
        self.outstanding.fetch_add(1, Ordering::SeqCst);

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            result = self.sender.send(address) => result.is_ok(),
        };

        if sent {
            Ok(())
        } else {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            Err(SpiderError::Cancelled)
        }
    }

    /// Takes the next address, waiting until one is available
    ///
    /// Cancel-safe: dropping the future never loses a queued address.
    pub async fn pop(&self) -> Option<String> {
        self.receiver.lock().await.recv().await
    }

    /// Marks a dequeued address as being processed
    ///
    /// The returned guard lowers the active and outstanding counts when the
    /// pipeline finishes, including on unwind.
    pub fn begin_work(&self) -> ActiveWork<'_> {
        self.active.fetch_add(1, Ordering::SeqCst);
        ActiveWork { queue: self }
    }

    /// Addresses queued or in flight
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// True when nothing is queued and no worker is mid-pipeline
    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }
}

impl QueueGauge for WorkQueue {
    fn queued(&self) -> usize {
        self.len()
    }

    fn active(&self) -> usize {
        WorkQueue::active(self)
    }
}

/// Guard for one address being processed
pub struct ActiveWork<'a> {
    queue: &'a WorkQueue,
}

impl Drop for ActiveWork<'_> {
    fn drop(&mut self) {
        self.queue.active.fetch_sub(1, Ordering::SeqCst);
        self.queue.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cancels `cancel` once the queue has no outstanding work
///
/// Polls every `poll_interval`; the first check happens one interval after
/// start so freshly admitted seeds are already counted.
pub async fn monitor_idle(queue: Arc<WorkQueue>, poll_interval: Duration, cancel: CancellationToken) {
    let start = tokio::time::Instant::now() + poll_interval;
    let mut ticker = tokio::time::interval_at(start, poll_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if queue.is_idle() {
                    tracing::info!("No work remaining, finishing crawl");
                    cancel.cancel();
                    break;
                }
                tracing::trace!(
                    "Idle check: {} queued, {} active",
                    queue.len(),
                    queue.active()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_insert_once() {
        let ledger = Ledger::new();
        assert!(ledger.insert("http://a.test"));
        assert!(!ledger.insert("http://a.test"));
        assert!(ledger.contains("http://a.test"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_ledger_concurrent_insert_admits_once() {
        let ledger = Arc::new(Ledger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.insert("http://a.test/page"))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|inserted| *inserted)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        let queue = WorkQueue::new(0);
        assert_eq!(queue.capacity(), DEFAULT_QUEUE_SIZE);
    }

    #[test]
    fn test_try_push_full_queue() {
        let queue = WorkQueue::new(2);
        assert!(queue.try_push("http://a.test/1".to_string()));
        assert!(queue.try_push("http://a.test/2".to_string()));
        assert!(!queue.try_push("http://a.test/3".to_string()));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.outstanding(), 2);
    }

    #[tokio::test]
    async fn test_outstanding_spans_processing() {
        let queue = WorkQueue::new(4);
        assert!(queue.is_idle());

        queue.try_push("http://a.test".to_string());
        let address = queue.pop().await.unwrap();
        assert_eq!(address, "http://a.test");
        assert!(queue.is_empty());
        assert!(!queue.is_idle());

        {
            let _work = queue.begin_work();
            assert_eq!(queue.active(), 1);
            assert!(!queue.is_idle());
        }

        assert_eq!(queue.active(), 0);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_push_gives_up_on_cancel() {
        let queue = WorkQueue::new(1);
        queue.try_push("http://a.test/1".to_string());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = queue.push("http://a.test/2".to_string(), &cancel).await;

        assert!(matches!(result, Err(SpiderError::Cancelled)));
        assert_eq!(queue.outstanding(), 1);
    }

    #[tokio::test]
    async fn test_monitor_cancels_when_idle() {
        let queue = Arc::new(WorkQueue::new(4));
        let cancel = CancellationToken::new();

        monitor_idle(queue, Duration::from_millis(10), cancel.clone()).await;
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_monitor_waits_for_outstanding_work() {
        let queue = Arc::new(WorkQueue::new(4));
        queue.try_push("http://a.test".to_string());
        let cancel = CancellationToken::new();

        let monitor = tokio::spawn(monitor_idle(
            queue.clone(),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!cancel.is_cancelled());

        queue.pop().await.unwrap();
        drop(queue.begin_work());

        tokio::time::timeout(Duration::from_secs(1), monitor)
            .await
            .unwrap()
            .unwrap();
        assert!(cancel.is_cancelled());
    }
}
