//! Storage traits and error types
//!
//! This module defines the trait interface for record store backends and
//! associated error types.

use crate::state::{ErrorKind, TargetStatus};
use crate::storage::{ExtractedTextRecord, NewTarget, RunRecord, RunStatus, TargetRecord};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Target not found: {0}")]
    TargetNotFound(i64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid status transition for target {id}: {from} -> {to}")]
    InvalidTransition {
        id: i64,
        from: TargetStatus,
        to: TargetStatus,
    },
}

impl StorageError {
    /// Returns true if retrying the same write can never succeed
    ///
    /// A missing row, a refused transition or a constraint violation will fail
    /// the same way on every attempt. Lock and I/O failures may clear up.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::TargetNotFound(_) | Self::InvalidTransition { .. } => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::ConstraintViolation
            }
            Self::Sqlite(_) | Self::Unavailable(_) => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A store shared between the orchestrator and the persister task
pub type SharedStore<S> = Arc<Mutex<S>>;

/// Locks a shared store, mapping a poisoned lock to `StorageError::Unavailable`
pub fn lock_store<S>(store: &Mutex<S>) -> StorageResult<MutexGuard<'_, S>> {
    store
        .lock()
        .map_err(|_| StorageError::Unavailable("store lock poisoned".to_string()))
}

/// Trait for record store implementations
///
/// Every write touches a single row and is atomic on its own; the crawl engine
/// never relies on multi-row transactions.
pub trait TargetStore: Send {
    // ===== Targets =====

    /// Inserts a new pending target and returns its ID
    fn insert_target(&mut self, target: &NewTarget) -> StorageResult<i64>;

    /// Gets a target by ID
    fn get_target(&self, id: i64) -> StorageResult<TargetRecord>;

    /// Lists targets whose status is not `success`, ordered by ID
    ///
    /// # Arguments
    ///
    /// * `region` - Optional country code filter (exact match)
    fn list_pending_targets(&self, region: Option<&str>) -> StorageResult<Vec<TargetRecord>>;

    /// Marks a target as `in_progress`
    ///
    /// Fails with `InvalidTransition` for targets that already succeeded.
    fn mark_in_progress(&mut self, id: i64) -> StorageResult<()>;

    /// Sets status `success`, clears error fields and stamps the attempt time
    ///
    /// Fails with `InvalidTransition` unless the target is `pending`,
    /// `in_progress` or already `success` (a refreshed text).
    fn record_success(&mut self, id: i64, at: DateTime<Utc>) -> StorageResult<()>;

    /// Sets status `error` with kind, detail and attempt time
    ///
    /// Fails with `InvalidTransition` for targets that already succeeded.
    fn record_error(
        &mut self,
        id: i64,
        kind: ErrorKind,
        detail: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Resets `error` targets back to `pending` for a manual retry
    ///
    /// Returns the number of targets reset.
    fn reset_errors(&mut self, region: Option<&str>) -> StorageResult<u64>;

    // ===== Extracted Text =====

    /// Inserts or replaces the extracted text for a target
    fn upsert_text(
        &mut self,
        target_id: i64,
        text: &str,
        cleaned: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Gets the extracted text for a target, if any
    fn get_text(&self, target_id: i64) -> StorageResult<Option<ExtractedTextRecord>>;

    /// Counts stored text records
    fn count_texts(&self) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new crawl run
    fn create_run(
        &mut self,
        config_hash: &str,
        concurrency: usize,
        region: Option<&str>,
    ) -> StorageResult<i64>;

    /// Marks a run as finished with its final tallies
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        succeeded: u64,
        errored: u64,
    ) -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Statistics =====

    /// Counts targets in a status
    fn count_by_status(&self, status: TargetStatus) -> StorageResult<u64>;

    /// Gets total target count
    fn count_total_targets(&self) -> StorageResult<u64>;

    /// Gets error kinds of `error` targets with their counts, largest first
    fn error_kind_summary(&self) -> StorageResult<Vec<(ErrorKind, u64)>>;
}
