//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Range-Sweep database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    range_start INTEGER NOT NULL,
    range_end INTEGER NOT NULL,
    status TEXT NOT NULL,
    live_count INTEGER NOT NULL DEFAULT 0
);

-- Classified documents, keyed by identifier
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT '',
    size TEXT NOT NULL DEFAULT '',
    seeders INTEGER NOT NULL DEFAULT 0,
    magnet TEXT,
    status TEXT NOT NULL,
    scraped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_category ON records(category);
CREATE INDEX IF NOT EXISTS idx_records_status ON records(status);

-- Tombstones for identifiers that redirect or 404
CREATE TABLE IF NOT EXISTS dead_ids (
    id INTEGER PRIMARY KEY,
    discovered_at TEXT NOT NULL
);

-- Identifiers whose fetch failed at the transport level
CREATE TABLE IF NOT EXISTS error_ids (
    id INTEGER PRIMARY KEY,
    attempts INTEGER NOT NULL DEFAULT 1,
    last_error TEXT NOT NULL,
    last_attempt_at TEXT NOT NULL
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
