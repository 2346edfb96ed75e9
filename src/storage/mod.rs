//! Storage module for the target record store
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Target status and error bookkeeping
//! - Extracted text upserts
//! - Run tracking for the stats report

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{lock_store, SharedStore, StorageError, StorageResult, TargetStore};

use crate::state::{ErrorKind, TargetStatus};
use crate::TesseraError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(TesseraError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, TesseraError> {
    SqliteStorage::new(path)
}

/// A target row as stored in the record store
#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub id: i64,
    pub name: Option<String>,
    /// Raw website/domain value, e.g. `example.it` or `www.example.it/`
    pub domain: Option<String>,
    /// Fallback URL used when no domain is present
    pub url: Option<String>,
    pub country_code: Option<String>,
    pub status: TargetStatus,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
    pub last_attempt_at: Option<String>,
    pub created_at: String,
}

/// Fields supplied when a target is created
#[derive(Debug, Clone, Default)]
pub struct NewTarget {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub url: Option<String>,
    pub country_code: Option<String>,
}

impl NewTarget {
    /// Shorthand for a target identified only by its domain
    pub fn with_domain(domain: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            ..Self::default()
        }
    }

    pub fn country(mut self, code: &str) -> Self {
        self.country_code = Some(code.to_string());
        self
    }
}

/// Extracted text paired one-to-one with a target
#[derive(Debug, Clone)]
pub struct ExtractedTextRecord {
    pub target_id: i64,
    pub text_content: String,
    /// Truncated variant of `text_content`
    pub cleaned_content: Option<String>,
    pub captured_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub concurrency: u32,
    pub region: Option<String>,
    pub status: RunStatus,
    pub succeeded: u64,
    pub errored: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Dispatch stopped early by Ctrl-C or the run deadline
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
