//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives a crawl run end to end:
//! - Loading every target not yet fetched successfully (optionally one region)
//! - Dispatching one fetch task per target through the concurrency gate
//! - Handing outcomes to the persister task
//! - Stopping dispatch on cancellation and draining in-flight fetches
//! - Recording the run and reporting a summary

use crate::config::{effective_concurrency, normalize_region, Config};
use crate::crawler::fetcher::{Fetcher, HttpPageClient, Outcome, PageClient};
use crate::crawler::gate::ConcurrencyGate;
use crate::crawler::persister::{
    spawn_persister, BatchPersister, PersisterSettings, FINAL_FLUSH_PAUSE,
};
use crate::crawler::progress::{CrawlProgress, ProgressSnapshot};
use crate::storage::{
    lock_store, open_storage, RunStatus, SharedStore, StorageError, TargetStore,
};
use crate::{Result, TesseraError};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Lifecycle of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Reading candidate targets from the store
    Loading,
    /// Dispatching fetches
    Running,
    /// Dispatch has stopped; waiting for in-flight fetches and the final flush
    Draining,
    Done,
}

/// Per-run overrides of the configuration
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides `crawler.concurrency`
    pub concurrency: Option<usize>,
    /// Overrides `crawler.region`
    pub region: Option<String>,
    /// Hash of the configuration file, recorded with the run
    pub config_hash: String,
    /// Cancelling this token stops dispatch; in-flight fetches still complete
    pub cancel: CancellationToken,
}

/// Summary of a finished crawl run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// `None` when there was nothing to fetch and no run was recorded
    pub run_id: Option<i64>,
    pub succeeded: u64,
    pub errored: u64,
    /// Candidates never dispatched because the run was cancelled
    pub skipped: u64,
    pub cancelled: bool,
}

impl CrawlSummary {
    pub fn processed(&self) -> u64 {
        self.succeeded + self.errored
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<S, C> {
    config: Config,
    store: SharedStore<S>,
    fetcher: Arc<Fetcher<C>>,
    gate: ConcurrencyGate,
    progress: Arc<CrawlProgress>,
    cancel: CancellationToken,
    region: Option<String>,
    config_hash: String,
    phase: RunPhase,
}

impl<S, C> Coordinator<S, C>
where
    S: TargetStore + 'static,
    C: PageClient + 'static,
{
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `options` - Per-run overrides and the cancellation token
    /// * `store` - The shared record store
    /// * `client` - The page client every fetch goes through
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(TesseraError)` - The concurrency or region override is invalid
    pub fn new(
        config: Config,
        options: RunOptions,
        store: SharedStore<S>,
        client: Arc<C>,
    ) -> Result<Self> {
        let concurrency = effective_concurrency(&config, options.concurrency)?;

        let region = options
            .region
            .or_else(|| config.crawler.region.clone())
            .map(|code| normalize_region(&code))
            .transpose()?;

        let fetcher = Fetcher::new(client, config.crawler.min_content_chars);

        Ok(Self {
            config,
            store,
            fetcher: Arc::new(fetcher),
            gate: ConcurrencyGate::new(concurrency),
            progress: Arc::new(CrawlProgress::new()),
            cancel: options.cancel,
            region,
            config_hash: options.config_hash,
            phase: RunPhase::Loading,
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn store(&self) -> SharedStore<S> {
        Arc::clone(&self.store)
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the crawl to completion or cancellation
    ///
    /// Every candidate target is fetched exactly once; at most `concurrency`
    /// fetches are in flight at any moment. After cancellation no new fetch
    /// starts, but in-flight fetches finish and their outcomes are persisted.
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        self.phase = RunPhase::Loading;
        let candidates = {
            let store = lock_store(&self.store)?;
            store.list_pending_targets(self.region.as_deref())?
        };

        if candidates.is_empty() {
            tracing::info!("No targets left to fetch");
            self.phase = RunPhase::Done;
            return Ok(CrawlSummary::default());
        }

        let total = candidates.len() as u64;
        let run_id = lock_store(&self.store)?.create_run(
            &self.config_hash,
            self.gate.width(),
            self.region.as_deref(),
        )?;
        tracing::info!(
            "Starting crawl run {}: {} target(s), concurrency {}{}",
            run_id,
            total,
            self.gate.width(),
            self.region
                .as_deref()
                .map(|r| format!(", region {}", r))
                .unwrap_or_default()
        );

        self.phase = RunPhase::Running;
        let deadline = self.arm_deadline();

        let (sender, receiver) = mpsc::channel(
            self.config
                .persistence
                .flush_threshold
                .max(self.gate.width()),
        );
        let persister = BatchPersister::new(Arc::clone(&self.store), &self.config.persistence);
        let persister_handle = spawn_persister(
            persister,
            receiver,
            Arc::clone(&self.progress),
            PersisterSettings {
                final_flush_attempts: self.config.persistence.final_flush_attempts,
                retry_pause: FINAL_FLUSH_PAUSE,
                progress_every: self.config.crawler.progress_every,
            },
        );

        let mut tasks = JoinSet::new();
        let mut dispatched = 0u64;

        for target in candidates {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = self.gate.acquire() => permit,
            };
            let Some(permit) = permit else {
                tracing::warn!("Dispatch stopped after {} of {} target(s)", dispatched, total);
                break;
            };

            if let Err(e) = lock_store(&self.store)
                .and_then(|mut store| store.mark_in_progress(target.id))
            {
                tracing::warn!("Could not mark target {} in progress: {}", target.id, e);
            }

            self.progress.record_dispatch();
            dispatched += 1;

            let fetcher = Arc::clone(&self.fetcher);
            let sender = sender.clone();
            tasks.spawn(async move {
                let target_id = target.id;
                let outcome = fetcher.fetch(&target).await;
                if sender.send(outcome).await.is_err() {
                    tracing::error!("Persister stopped, outcome for target {} dropped", target_id);
                }
                drop(permit);
            });

            while let Some(joined) = tasks.try_join_next() {
                note_task_result(joined);
            }
        }

        self.phase = RunPhase::Draining;
        drop(sender);
        while let Some(joined) = tasks.join_next().await {
            note_task_result(joined);
        }
        if let Some(deadline) = deadline {
            deadline.abort();
        }

        let persisted = persister_handle.await?;
        let snapshot = self.progress.snapshot();
        let skipped = total - dispatched;
        let cancelled = skipped > 0;

        let status = match (&persisted, cancelled) {
            (Err(_), _) => RunStatus::Failed,
            (Ok(_), true) => RunStatus::Cancelled,
            (Ok(_), false) => RunStatus::Completed,
        };
        if let Err(e) = lock_store(&self.store).and_then(|mut store| {
            store.finish_run(run_id, status, snapshot.succeeded, snapshot.errored)
        }) {
            tracing::warn!("Could not record the end of run {}: {}", run_id, e);
        }

        self.phase = RunPhase::Done;
        let report = persisted?;

        tracing::info!(
            "Run {} finished: {} succeeded, {} errored, {} skipped ({} written in {} flush(es))",
            run_id,
            snapshot.succeeded,
            snapshot.errored,
            skipped,
            report.persisted,
            report.flushes
        );
        if report.dropped > 0 {
            tracing::warn!(
                "Run {}: {} outcome(s) refused by the store and not recorded",
                run_id,
                report.dropped
            );
        }

        Ok(CrawlSummary {
            run_id: Some(run_id),
            succeeded: snapshot.succeeded,
            errored: snapshot.errored,
            skipped,
            cancelled,
        })
    }

    /// Fetches and persists a single target regardless of its status
    ///
    /// A target that already succeeded gets its text replaced when the new
    /// fetch succeeds. A failed refetch is returned but not recorded, since
    /// `success` never moves back to `error`.
    pub async fn crawl_target(&mut self, target_id: i64) -> Result<Outcome> {
        let target = lock_store(&self.store)?
            .get_target(target_id)
            .map_err(|e| match e {
                StorageError::TargetNotFound(id) => TesseraError::TargetNotFound(id),
                other => other.into(),
            })?;

        if !target.status.needs_fetch() {
            tracing::info!("Target {} already succeeded, fetching it again", target_id);
        } else if let Err(e) =
            lock_store(&self.store).and_then(|mut store| store.mark_in_progress(target_id))
        {
            tracing::warn!("Could not mark target {} in progress: {}", target_id, e);
        }

        self.phase = RunPhase::Running;
        let outcome = self.fetcher.fetch(&target).await;

        self.phase = RunPhase::Draining;
        let mut persister = BatchPersister::new(Arc::clone(&self.store), &self.config.persistence);
        if let Err(e) = persister.record(outcome.clone()) {
            tracing::warn!("Flush failed for target {}: {}", target_id, e);
        }
        let attempts = self.config.persistence.final_flush_attempts;
        tokio::task::spawn_blocking(move || persister.finish(attempts, FINAL_FLUSH_PAUSE))
            .await??;

        self.phase = RunPhase::Done;
        Ok(outcome)
    }

    /// Cancels the run once `crawler.max-run-secs` has elapsed
    fn arm_deadline(&self) -> Option<tokio::task::JoinHandle<()>> {
        let secs = self.config.crawler.max_run_secs;
        if secs == 0 {
            return None;
        }

        let token = self.cancel.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!("Run deadline of {}s reached, stopping dispatch", secs);
            token.cancel();
        }))
    }
}

fn note_task_result(result: std::result::Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!("Fetch task failed: {}", e);
    }
}

/// Runs a crawl against the configured database with the HTTP client
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `options` - Per-run overrides and the cancellation token
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The run finished or was cancelled cleanly
/// * `Err(TesseraError)` - Setup failed or outcomes could not be persisted
pub async fn run_crawl(config: Config, options: RunOptions) -> Result<CrawlSummary> {
    let storage = open_storage(Path::new(&config.storage.database_path))?;
    let client = HttpPageClient::new(&config)?;

    let mut coordinator = Coordinator::new(
        config,
        options,
        Arc::new(Mutex::new(storage)),
        Arc::new(client),
    )?;
    coordinator.run().await
}

/// Fetches one target by ID and records its outcome
pub async fn crawl_single(config: Config, target_id: i64) -> Result<Outcome> {
    let storage = open_storage(Path::new(&config.storage.database_path))?;
    let client = HttpPageClient::new(&config)?;

    let mut coordinator = Coordinator::new(
        config,
        RunOptions::default(),
        Arc::new(Mutex::new(storage)),
        Arc::new(client),
    )?;
    coordinator.crawl_target(target_id).await
}
