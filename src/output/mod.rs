//! Output module for crawl reports
//!
//! This module handles:
//! - Recording crawl statistics from the record store
//! - Printing statistics and run summaries

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use crate::crawler::CrawlSummary;

/// Prints the one-line summary of a finished run
pub fn print_run_summary(summary: &CrawlSummary) {
    let verb = if summary.cancelled {
        "Crawl cancelled"
    } else {
        "Crawl finished"
    };

    println!(
        "{}: {} succeeded, {} errored, {} skipped",
        verb, summary.succeeded, summary.errored, summary.skipped
    );
}
