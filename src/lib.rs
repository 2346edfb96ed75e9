//! Tessera: a resumable bulk site-text harvester
//!
//! This crate fetches one landing page per target record (a company identified
//! by its domain), extracts readable text, classifies failures into a stable
//! taxonomy and persists outcomes in batches, so an interrupted run can be
//! resumed without re-fetching targets that already succeeded.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Tessera operations
#[derive(Debug, Error)]
pub enum TesseraError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Persistence failed, {unrecorded} outcome(s) not recorded: {message}")]
    Persistence { unrecorded: usize, message: String },

    #[error("Target not found: {0}")]
    TargetNotFound(i64),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl_single, run_crawl, CrawlSummary, Outcome, RunOptions};
pub use state::{ErrorKind, TargetStatus};
