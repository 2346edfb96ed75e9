//! Scripted page client, flaky store and fixtures shared by the crawler unit tests

use crate::crawler::classifier::Failure;
use crate::crawler::fetcher::{PageClient, PageResponse};
use crate::state::{ErrorKind, TargetStatus};
use crate::storage::{
    ExtractedTextRecord, NewTarget, RunRecord, RunStatus, SqliteStorage, StorageError,
    StorageResult, TargetRecord, TargetStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers each URL from a fixed script and records every call
pub struct StubClient {
    routes: HashMap<String, Result<PageResponse, Failure>>,
    fallback: Result<PageResponse, Failure>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StubClient {
    /// Unscripted URLs fail like an unknown host
    pub fn new() -> Self {
        Self::failing(Failure::Transport {
            message: "error sending request: dns error: failed to lookup address information"
                .to_string(),
            timed_out: false,
            connect: true,
        })
    }

    /// Unscripted URLs fail with `failure`
    pub fn failing(failure: Failure) -> Self {
        Self::with_fallback(Err(failure))
    }

    /// Unscripted URLs serve `html`
    pub fn serving(html: &str) -> Self {
        Self::with_fallback(Ok(PageResponse::ok(html)))
    }

    fn with_fallback(fallback: Result<PageResponse, Failure>) -> Self {
        Self {
            routes: HashMap::new(),
            fallback,
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.routes
            .insert(url.to_string(), Ok(PageResponse::ok(html)));
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(
            url.to_string(),
            Ok(PageResponse {
                status,
                body: String::new(),
            }),
        );
        self
    }

    pub fn failure(mut self, url: &str, failure: Failure) -> Self {
        self.routes.insert(url.to_string(), Err(failure));
        self
    }

    /// Every request sleeps this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of requests observed in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageClient for StubClient {
    async fn get(&self, url: &str) -> Result<PageResponse, Failure> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.routes
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// A pending target record that was never stored
pub fn target(id: i64, domain: Option<&str>) -> TargetRecord {
    TargetRecord {
        id,
        name: None,
        domain: domain.map(str::to_string),
        url: None,
        country_code: None,
        status: TargetStatus::Pending,
        error_kind: None,
        error_detail: None,
        last_attempt_at: None,
        created_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

/// Switch controlling when a `FlakyStore` goes offline
#[derive(Debug, Clone)]
pub struct Outage(Arc<AtomicUsize>);

impl Outage {
    /// Lets `writes` more row writes through, then fails every write
    pub fn after(&self, writes: usize) {
        self.0.store(writes, Ordering::SeqCst);
    }

    /// Brings the store back online
    pub fn end(&self) {
        self.0.store(usize::MAX, Ordering::SeqCst);
    }

    fn allow_write(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }
}

/// In-memory store whose status and text writes fail with
/// `StorageError::Unavailable` while an outage is on
pub struct FlakyStore {
    inner: SqliteStorage,
    outage: Outage,
}

impl FlakyStore {
    pub fn new(inner: SqliteStorage) -> (Self, Outage) {
        let outage = Outage(Arc::new(AtomicUsize::new(usize::MAX)));
        (
            Self {
                inner,
                outage: outage.clone(),
            },
            outage,
        )
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.outage.allow_write() {
            Ok(())
        } else {
            Err(StorageError::Unavailable("database is locked".to_string()))
        }
    }
}

impl TargetStore for FlakyStore {
    fn insert_target(&mut self, target: &NewTarget) -> StorageResult<i64> {
        self.inner.insert_target(target)
    }

    fn get_target(&self, id: i64) -> StorageResult<TargetRecord> {
        self.inner.get_target(id)
    }

    fn list_pending_targets(&self, region: Option<&str>) -> StorageResult<Vec<TargetRecord>> {
        self.inner.list_pending_targets(region)
    }

    fn mark_in_progress(&mut self, id: i64) -> StorageResult<()> {
        self.inner.mark_in_progress(id)
    }

    fn record_success(&mut self, id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        self.check_online()?;
        self.inner.record_success(id, at)
    }

    fn record_error(
        &mut self,
        id: i64,
        kind: ErrorKind,
        detail: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.check_online()?;
        self.inner.record_error(id, kind, detail, at)
    }

    fn reset_errors(&mut self, region: Option<&str>) -> StorageResult<u64> {
        self.inner.reset_errors(region)
    }

    fn upsert_text(
        &mut self,
        target_id: i64,
        text: &str,
        cleaned: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.check_online()?;
        self.inner.upsert_text(target_id, text, cleaned, at)
    }

    fn get_text(&self, target_id: i64) -> StorageResult<Option<ExtractedTextRecord>> {
        self.inner.get_text(target_id)
    }

    fn count_texts(&self) -> StorageResult<u64> {
        self.inner.count_texts()
    }

    fn create_run(
        &mut self,
        config_hash: &str,
        concurrency: usize,
        region: Option<&str>,
    ) -> StorageResult<i64> {
        self.inner.create_run(config_hash, concurrency, region)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        succeeded: u64,
        errored: u64,
    ) -> StorageResult<()> {
        self.inner.finish_run(run_id, status, succeeded, errored)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.inner.get_latest_run()
    }

    fn count_by_status(&self, status: TargetStatus) -> StorageResult<u64> {
        self.inner.count_by_status(status)
    }

    fn count_total_targets(&self) -> StorageResult<u64> {
        self.inner.count_total_targets()
    }

    fn error_kind_summary(&self) -> StorageResult<Vec<(ErrorKind, u64)>> {
        self.inner.error_kind_summary()
    }
}
