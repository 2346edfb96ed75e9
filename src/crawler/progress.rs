//! Run progress counters

use crate::crawler::fetcher::Outcome;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated as targets are dispatched and their outcomes recorded
#[derive(Debug, Default)]
pub struct CrawlProgress {
    dispatched: AtomicU64,
    completed: AtomicU64,
    succeeded: AtomicU64,
    errored: AtomicU64,
}

/// Point-in-time copy of [`CrawlProgress`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub dispatched: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub errored: u64,
}

impl ProgressSnapshot {
    /// Dispatched targets whose outcome has not been recorded yet
    pub fn in_flight(&self) -> u64 {
        self.dispatched.saturating_sub(self.completed)
    }
}

impl CrawlProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
    }

    /// Counts a finished target and returns the updated totals
    pub fn record_outcome(&self, outcome: &Outcome) -> ProgressSnapshot {
        if outcome.is_success() {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.errored.fetch_add(1, Ordering::SeqCst);
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.snapshot()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            dispatched: self.dispatched.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            errored: self.errored.load(Ordering::SeqCst),
        }
    }
}
