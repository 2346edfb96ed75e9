//! Concurrency gate for in-flight fetches
//!
//! A counting semaphore of fixed width. The orchestrator acquires a permit
//! before spawning each fetch task, so at most `width` fetches are ever live;
//! the permit travels with the task and returns its slot when dropped, on
//! success, failure or panic alike.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Default)]
struct GateCounters {
    acquired: AtomicU64,
    released: AtomicU64,
    peak: AtomicU64,
}

/// Bounds the number of concurrently running fetches
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    width: usize,
    counters: Arc<GateCounters>,
}

/// A held slot in the gate
///
/// The slot is returned when the permit is dropped.
#[derive(Debug)]
pub struct GatePermit {
    counters: Arc<GateCounters>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Counted before the semaphore slot itself is released
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl ConcurrencyGate {
    /// Creates a gate admitting `width` concurrent holders
    pub fn new(width: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(width)),
            width,
            counters: Arc::new(GateCounters::default()),
        }
    }

    /// Waits for a free slot
    ///
    /// Returns `None` only once the gate has been closed.
    pub async fn acquire(&self) -> Option<GatePermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;

        let acquired = self.counters.acquired.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = acquired.saturating_sub(self.counters.released.load(Ordering::SeqCst));
        self.counters.peak.fetch_max(in_flight, Ordering::SeqCst);

        Some(GatePermit {
            counters: self.counters.clone(),
            _permit: permit,
        })
    }

    /// Stops admitting holders; pending and future `acquire` calls return `None`
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of free slots right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held
    pub fn in_flight(&self) -> u64 {
        let released = self.counters.released.load(Ordering::SeqCst);
        self.counters
            .acquired
            .load(Ordering::SeqCst)
            .saturating_sub(released)
    }

    /// Highest number of permits held at once since the gate was created
    pub fn peak_in_flight(&self) -> u64 {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Total permits handed out
    pub fn total_acquired(&self) -> u64 {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    /// Total permits returned
    pub fn total_released(&self) -> u64 {
        self.counters.released.load(Ordering::SeqCst)
    }
}
