//! Crawl lifecycle state for a single crawler instance
//!
//! A crawler moves Idle → Running when `crawl` starts and back to Idle when it
//! returns. The transition is made under one mutex, so a second `crawl` on the
//! same instance is rejected at the transition point.

use crate::SpiderError;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// The current lifecycle state of a crawler
#[derive(Debug, Clone, Default)]
pub enum RunState {
    /// No crawl in progress
    #[default]
    Idle,

    /// A crawl is in progress; the token cancels it
    Running {
        cancel: CancellationToken,
        started_at: Instant,
    },
}

impl RunState {
    /// Returns true while a crawl is in progress
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Owner of a crawler's run state
#[derive(Debug, Default)]
pub struct RunControl {
    state: Mutex<RunState>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves Idle → Running with the given cancellation scope
    ///
    /// The returned guard moves the state back to Idle and cancels the scope
    /// when dropped, on every exit path of the crawl.
    ///
    /// # Returns
    ///
    /// * `Ok(RunGuard)` - The crawl may proceed
    /// * `Err(SpiderError::AlreadyRunning)` - Another crawl holds the instance
    pub fn begin(&self, cancel: CancellationToken) -> Result<RunGuard<'_>, SpiderError> {
        let mut state = self.lock();
        if state.is_running() {
            return Err(SpiderError::AlreadyRunning);
        }

        *state = RunState::Running {
            cancel: cancel.clone(),
            started_at: Instant::now(),
        };

        Ok(RunGuard {
            control: self,
            cancel,
        })
    }

    /// Cancels the running crawl, if any
    ///
    /// Returns true if a crawl was running. Calling this repeatedly, or while
    /// idle, is harmless.
    pub fn stop(&self) -> bool {
        match &*self.lock() {
            RunState::Running { cancel, .. } => {
                cancel.cancel();
                true
            }
            RunState::Idle => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    /// How long the current crawl has been running
    pub fn elapsed(&self) -> Option<Duration> {
        match &*self.lock() {
            RunState::Running { started_at, .. } => Some(started_at.elapsed()),
            RunState::Idle => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds a crawler in the Running state
pub struct RunGuard<'a> {
    control: &'a RunControl,
    cancel: CancellationToken,
}

impl RunGuard<'_> {
    /// The cancellation scope of this crawl
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.cancel.cancel();
        *self.control.lock() = RunState::Idle;
    }
}
