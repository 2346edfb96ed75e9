//! Crawler module for landing-page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Failure classification into the persisted error taxonomy
//! - Readable-text extraction from HTML
//! - Fetching a target through its four URL variants
//! - Bounding in-flight fetches with a concurrency gate
//! - Batched persistence of outcomes
//! - Overall crawl coordination

mod classifier;
mod coordinator;
mod extractor;
mod fetcher;
mod gate;
mod persister;
mod progress;

#[cfg(test)]
mod test_support;

pub use classifier::{classify, error_detail, truncate_chars, Failure, MAX_DETAIL_CHARS};
pub use coordinator::{crawl_single, run_crawl, Coordinator, CrawlSummary, RunOptions, RunPhase};
pub use extractor::{check_content, extract_text, normalize_lines};
pub use fetcher::{
    build_http_client, clean_domain, resolve_domain, url_variants, Fetcher, HttpPageClient,
    Outcome, PageClient, PageResponse,
};
pub use gate::{ConcurrencyGate, GatePermit};
pub use persister::{
    spawn_persister, BatchPersister, FlushReport, PersisterReport, PersisterSettings,
    FINAL_FLUSH_PAUSE,
};
pub use progress::{CrawlProgress, ProgressSnapshot};
