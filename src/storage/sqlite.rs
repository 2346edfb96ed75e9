//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the TargetStore trait.

use crate::state::{ErrorKind, TargetStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, TargetStore};
use crate::storage::{ExtractedTextRecord, NewTarget, RunRecord, RunStatus, TargetRecord};
use crate::TesseraError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const TARGET_COLUMNS: &str = "id, name, domain, url, country_code, status, error_kind, \
     error_detail, last_attempt_at, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(TesseraError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, TesseraError> {
        let conn = Connection::open(path)?;

        // WAL lets the stats command read while a crawl is writing
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> Result<Self, TesseraError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn target_exists(&self, id: i64) -> StorageResult<Option<TargetStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM targets WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(status.map(|s| TargetStatus::from_db_string(&s).unwrap_or(TargetStatus::Pending)))
    }

    /// Refuses a status write that `TargetStatus::can_transition_to` forbids
    fn check_transition(&self, id: i64, to: TargetStatus) -> StorageResult<()> {
        match self.target_exists(id)? {
            None => Err(StorageError::TargetNotFound(id)),
            Some(from) if from.can_transition_to(to) => Ok(()),
            Some(from) => Err(StorageError::InvalidTransition { id, from, to }),
        }
    }
}

fn row_to_target(row: &Row<'_>) -> rusqlite::Result<TargetRecord> {
    let error_kind: Option<String> = row.get(6)?;
    Ok(TargetRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        domain: row.get(2)?,
        url: row.get(3)?,
        country_code: row.get(4)?,
        status: TargetStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(TargetStatus::Pending),
        error_kind: error_kind.as_deref().and_then(ErrorKind::from_tag),
        error_detail: row.get(7)?,
        last_attempt_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        concurrency: row.get::<_, i64>(4)? as u32,
        region: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Running),
        succeeded: row.get::<_, i64>(7)? as u64,
        errored: row.get::<_, i64>(8)? as u64,
    })
}

impl TargetStore for SqliteStorage {
    // ===== Targets =====

    fn insert_target(&mut self, target: &NewTarget) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO targets (name, domain, url, country_code, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                target.name,
                target.domain,
                target.url,
                target.country_code,
                TargetStatus::Pending.to_db_string(),
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_target(&self, id: i64) -> StorageResult<TargetRecord> {
        let sql = format!("SELECT {} FROM targets WHERE id = ?1", TARGET_COLUMNS);
        self.conn
            .query_row(&sql, params![id], row_to_target)
            .optional()?
            .ok_or(StorageError::TargetNotFound(id))
    }

    fn list_pending_targets(&self, region: Option<&str>) -> StorageResult<Vec<TargetRecord>> {
        let sql = format!(
            "SELECT {} FROM targets
             WHERE status != ?1 AND (?2 IS NULL OR country_code = ?2)
             ORDER BY id ASC",
            TARGET_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let targets = stmt
            .query_map(
                params![TargetStatus::Success.to_db_string(), region],
                row_to_target,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(targets)
    }

    fn mark_in_progress(&mut self, id: i64) -> StorageResult<()> {
        self.check_transition(id, TargetStatus::InProgress)?;
        self.conn.execute(
            "UPDATE targets SET status = ?1 WHERE id = ?2",
            params![TargetStatus::InProgress.to_db_string(), id],
        )?;
        Ok(())
    }

    fn record_success(&mut self, id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        self.check_transition(id, TargetStatus::Success)?;
        let changed = self.conn.execute(
            "UPDATE targets SET status = ?1, error_kind = NULL, error_detail = NULL,
             last_attempt_at = ?2 WHERE id = ?3",
            params![TargetStatus::Success.to_db_string(), at.to_rfc3339(), id],
        )?;

        if changed == 0 {
            return Err(StorageError::TargetNotFound(id));
        }
        Ok(())
    }

    fn record_error(
        &mut self,
        id: i64,
        kind: ErrorKind,
        detail: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.check_transition(id, TargetStatus::Error)?;
        let changed = self.conn.execute(
            "UPDATE targets SET status = ?1, error_kind = ?2, error_detail = ?3,
             last_attempt_at = ?4 WHERE id = ?5",
            params![
                TargetStatus::Error.to_db_string(),
                kind.as_str(),
                detail,
                at.to_rfc3339(),
                id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::TargetNotFound(id));
        }
        Ok(())
    }

    fn reset_errors(&mut self, region: Option<&str>) -> StorageResult<u64> {
        let changed = self.conn.execute(
            "UPDATE targets SET status = ?1
             WHERE status = ?2 AND (?3 IS NULL OR country_code = ?3)",
            params![
                TargetStatus::Pending.to_db_string(),
                TargetStatus::Error.to_db_string(),
                region
            ],
        )?;
        Ok(changed as u64)
    }

    // ===== Extracted Text =====

    fn upsert_text(
        &mut self,
        target_id: i64,
        text: &str,
        cleaned: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO extracted_texts (target_id, text_content, cleaned_content, captured_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(target_id) DO UPDATE SET
                text_content = excluded.text_content,
                cleaned_content = excluded.cleaned_content,
                captured_at = excluded.captured_at",
            params![target_id, text, cleaned, at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn get_text(&self, target_id: i64) -> StorageResult<Option<ExtractedTextRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT target_id, text_content, cleaned_content, captured_at
                 FROM extracted_texts WHERE target_id = ?1",
                params![target_id],
                |row| {
                    Ok(ExtractedTextRecord {
                        target_id: row.get(0)?,
                        text_content: row.get(1)?,
                        cleaned_content: row.get(2)?,
                        captured_at: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    fn count_texts(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM extracted_texts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    fn create_run(
        &mut self,
        config_hash: &str,
        concurrency: usize,
        region: Option<&str>,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, concurrency, region, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                now,
                config_hash,
                concurrency as i64,
                region,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        succeeded: u64,
        errored: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, succeeded = ?3, errored = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                succeeded as i64,
                errored as i64,
                run_id
            ],
        )?;
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, concurrency, region, status,
                 succeeded, errored FROM runs ORDER BY id DESC LIMIT 1",
                [],
                row_to_run,
            )
            .optional()?;

        Ok(run)
    }

    // ===== Statistics =====

    fn count_by_status(&self, status: TargetStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM targets WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_targets(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM targets", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn error_kind_summary(&self) -> StorageResult<Vec<(ErrorKind, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT error_kind, COUNT(*) AS n FROM targets
             WHERE status = ?1 AND error_kind IS NOT NULL
             GROUP BY error_kind ORDER BY n DESC, error_kind ASC",
        )?;

        let rows = stmt.query_map(params![TargetStatus::Error.to_db_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut summary = Vec::new();
        for row in rows {
            let (tag, count) = row?;
            match ErrorKind::from_tag(&tag) {
                Some(kind) => summary.push((kind, count as u64)),
                None => tracing::debug!("Ignoring unknown error kind '{}' in summary", tag),
            }
        }

        Ok(summary)
    }
}
