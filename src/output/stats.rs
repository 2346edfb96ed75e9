//! Statistics generation from the record store
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::{ErrorKind, TargetStatus};
use crate::storage::{RunRecord, TargetStore};
use crate::TesseraError;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of targets in the store
    pub total_targets: u64,

    /// Count of targets by status
    pub targets_by_status: HashMap<TargetStatus, u64>,

    /// Error kinds of `error` targets with their counts, largest first
    pub error_summary: Vec<(ErrorKind, u64)>,

    /// Number of stored text records
    pub texts_stored: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// Targets currently in `status`
    pub fn count(&self, status: TargetStatus) -> u64 {
        self.targets_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Share of targets fetched successfully, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_targets == 0 {
            return 0.0;
        }
        (self.count(TargetStatus::Success) as f64 / self.total_targets as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The record store to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(TesseraError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn TargetStore) -> Result<CrawlStatistics, TesseraError> {
    let total_targets = storage.count_total_targets()?;

    let mut targets_by_status = HashMap::new();
    for status in TargetStatus::all() {
        let count = storage.count_by_status(status)?;
        if count > 0 {
            targets_by_status.insert(status, count);
        }
    }

    Ok(CrawlStatistics {
        total_targets,
        targets_by_status,
        error_summary: storage.error_kind_summary()?,
        texts_stored: storage.count_texts()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Total targets: {}", stats.total_targets);
    println!("  Texts stored: {}", stats.texts_stored);
    println!();

    println!("Targets by Status:");
    for status in TargetStatus::all() {
        let count = stats.count(status);
        let percentage = if stats.total_targets > 0 {
            (count as f64 / stats.total_targets as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.error_summary.is_empty() {
        println!("Error Summary:");
        for (kind, count) in &stats.error_summary {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if let Some(run) = &stats.latest_run {
        println!("Latest Run (#{}):", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Concurrency: {}", run.concurrency);
        if let Some(region) = &run.region {
            println!("  Region: {}", region);
        }
        println!(
            "  Outcomes: {} succeeded, {} errored",
            run.succeeded, run.errored
        );
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} targets fetched successfully)",
        stats.success_rate(),
        stats.count(TargetStatus::Success),
        stats.total_targets
    );
}
