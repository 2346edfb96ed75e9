//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Tessera database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    concurrency INTEGER NOT NULL,
    region TEXT,
    status TEXT NOT NULL,
    succeeded INTEGER NOT NULL DEFAULT 0,
    errored INTEGER NOT NULL DEFAULT 0
);

-- Targets to fetch, created by the import step
CREATE TABLE IF NOT EXISTS targets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    domain TEXT,
    url TEXT,
    country_code TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    error_kind TEXT,
    error_detail TEXT,
    last_attempt_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_targets_status ON targets(status);
CREATE INDEX IF NOT EXISTS idx_targets_country ON targets(country_code);

-- At most one text record per target
CREATE TABLE IF NOT EXISTS extracted_texts (
    target_id INTEGER PRIMARY KEY REFERENCES targets(id),
    text_content TEXT NOT NULL,
    cleaned_content TEXT,
    captured_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
