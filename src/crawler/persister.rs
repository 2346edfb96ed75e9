//! Batched outcome persistence
//!
//! Outcomes are buffered and written to the record store in batches. A flush
//! writes the buffer in FIFO order. An outcome the store can never accept (its
//! target row is gone, or the status change is refused) is logged and dropped.
//! Any other write failure stops the flush: the outcomes already written leave
//! the buffer and the rest stay for the next flush, so nothing is lost or
//! written twice. Fetch tasks hand their outcomes to a single persister task
//! over a channel, which makes the buffer single-owner.

use crate::config::PersistenceConfig;
use crate::crawler::classifier::truncate_chars;
use crate::crawler::fetcher::Outcome;
use crate::crawler::progress::CrawlProgress;
use crate::storage::{lock_store, SharedStore, StorageResult, TargetStore};
use crate::{Result, TesseraError};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pause between final flush attempts
pub const FINAL_FLUSH_PAUSE: Duration = Duration::from_secs(1);

/// Result of a successful flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Outcomes written by this flush
    pub written: usize,
    /// Outcomes the store refused for good and that were discarded
    pub dropped: usize,
}

/// Buffers outcomes and writes them to the store in batches
pub struct BatchPersister<S> {
    store: SharedStore<S>,
    buffer: VecDeque<Outcome>,
    flush_threshold: usize,
    cleaned_max_chars: usize,
    flushes: u64,
    persisted: u64,
    dropped: u64,
}

impl<S: TargetStore> BatchPersister<S> {
    pub fn new(store: SharedStore<S>, settings: &PersistenceConfig) -> Self {
        Self {
            store,
            buffer: VecDeque::with_capacity(settings.flush_threshold),
            flush_threshold: settings.flush_threshold.max(1),
            cleaned_max_chars: settings.cleaned_max_chars,
            flushes: 0,
            persisted: 0,
            dropped: 0,
        }
    }

    /// Buffers an outcome, flushing once the buffer reaches the threshold
    ///
    /// # Returns
    ///
    /// * `Ok(Some(report))` - The threshold was reached and the flush succeeded
    /// * `Ok(None)` - The outcome was only buffered
    /// * `Err(StorageError)` - The triggered flush failed; unwritten outcomes
    ///   remain buffered
    pub fn record(&mut self, outcome: Outcome) -> StorageResult<Option<FlushReport>> {
        self.buffer.push_back(outcome);
        if self.buffer.len() >= self.flush_threshold {
            self.flush().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Writes every buffered outcome in arrival order
    ///
    /// An empty buffer is a no-op and does not count as a flush.
    pub fn flush(&mut self) -> StorageResult<FlushReport> {
        if self.buffer.is_empty() {
            return Ok(FlushReport::default());
        }

        let mut store = lock_store(&self.store)?;
        let now = Utc::now();
        let mut report = FlushReport::default();

        while let Some(outcome) = self.buffer.front() {
            match write_outcome(&mut *store, outcome, now, self.cleaned_max_chars) {
                Ok(()) => report.written += 1,
                Err(e) if e.is_permanent() => {
                    warn!(
                        "Discarding {} outcome for target {}: {}",
                        if outcome.is_success() { "success" } else { "error" },
                        outcome.target_id(),
                        e
                    );
                    report.dropped += 1;
                }
                Err(e) => {
                    self.persisted += report.written as u64;
                    self.dropped += report.dropped as u64;
                    warn!(
                        "Flush stopped after {} write(s) at target {}: {}",
                        report.written,
                        outcome.target_id(),
                        e
                    );
                    return Err(e);
                }
            }
            self.buffer.pop_front();
        }

        self.flushes += 1;
        self.persisted += report.written as u64;
        self.dropped += report.dropped as u64;
        debug!(
            "Flushed {} outcome(s), {} discarded",
            report.written, report.dropped
        );
        Ok(report)
    }

    /// Final flush, retried up to `attempts` times
    ///
    /// Fails with `TesseraError::Persistence` naming how many outcomes could
    /// not be recorded.
    pub fn finish(&mut self, attempts: u32, pause: Duration) -> Result<FlushReport> {
        let attempts = attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.flush() {
                Ok(report) => return Ok(report),
                Err(e) => {
                    warn!("Final flush attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        std::thread::sleep(pause);
                    }
                }
            }
        }

        let cause = last_error.map(|e| e.to_string()).unwrap_or_default();
        let message = if self.persisted == 0 {
            format!("no outcome could be recorded during the run: {}", cause)
        } else {
            cause
        };
        error!(
            "{} outcome(s) could not be recorded: {}",
            self.buffer.len(),
            message
        );

        Err(TesseraError::Persistence {
            unrecorded: self.buffer.len(),
            message,
        })
    }

    /// Outcomes buffered but not yet written
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Number of flushes that wrote their whole buffer
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    /// Outcomes written so far
    pub fn persisted(&self) -> u64 {
        self.persisted
    }

    /// Outcomes discarded because the store refused them for good
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

fn write_outcome<S: TargetStore + ?Sized>(
    store: &mut S,
    outcome: &Outcome,
    at: DateTime<Utc>,
    cleaned_max_chars: usize,
) -> StorageResult<()> {
    match outcome {
        Outcome::Success { target_id, text } => {
            let cleaned = truncate_chars(text, cleaned_max_chars);
            store.upsert_text(*target_id, text, Some(&cleaned), at)?;
            store.record_success(*target_id, at)
        }
        Outcome::Failed {
            target_id,
            kind,
            detail,
        } => store.record_error(*target_id, *kind, detail, at),
    }
}

/// Settings of the persister task
#[derive(Debug, Clone)]
pub struct PersisterSettings {
    pub final_flush_attempts: u32,
    pub retry_pause: Duration,
    /// Log progress every this many recorded outcomes
    pub progress_every: u64,
}

/// Totals reported by a finished persister task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersisterReport {
    pub flushes: u64,
    pub persisted: u64,
    pub dropped: u64,
}

/// Runs the persister on the blocking pool until every sender is dropped
///
/// Each received outcome is counted in `progress` and buffered; when the
/// channel closes the remaining buffer is flushed with retries.
pub fn spawn_persister<S: TargetStore + 'static>(
    persister: BatchPersister<S>,
    receiver: mpsc::Receiver<Outcome>,
    progress: Arc<CrawlProgress>,
    settings: PersisterSettings,
) -> JoinHandle<Result<PersisterReport>> {
    tokio::task::spawn_blocking(move || run_persister(persister, receiver, &progress, &settings))
}

fn run_persister<S: TargetStore>(
    mut persister: BatchPersister<S>,
    mut receiver: mpsc::Receiver<Outcome>,
    progress: &CrawlProgress,
    settings: &PersisterSettings,
) -> Result<PersisterReport> {
    while let Some(outcome) = receiver.blocking_recv() {
        let snapshot = progress.record_outcome(&outcome);

        if let Err(e) = persister.record(outcome) {
            warn!(
                "Flush failed, {} outcome(s) kept for the next flush: {}",
                persister.pending(),
                e
            );
        }

        if settings.progress_every > 0 && snapshot.completed % settings.progress_every == 0 {
            info!(
                "Progress: {} done ({} ok, {} errors), {} in flight",
                snapshot.completed,
                snapshot.succeeded,
                snapshot.errored,
                snapshot.in_flight()
            );
        }
    }

    persister.finish(settings.final_flush_attempts, settings.retry_pause)?;

    Ok(PersisterReport {
        flushes: persister.flush_count(),
        persisted: persister.persisted(),
        dropped: persister.dropped(),
    })
}
