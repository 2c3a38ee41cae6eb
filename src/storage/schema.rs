//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Listing-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    targets_loaded INTEGER NOT NULL DEFAULT 0,
    pages_fetched INTEGER NOT NULL DEFAULT 0,
    fetches_failed INTEGER NOT NULL DEFAULT 0,
    listings_collected INTEGER NOT NULL DEFAULT 0,
    persisted INTEGER NOT NULL DEFAULT 0
);

-- Areas and search terms to crawl
CREATE TABLE IF NOT EXISTS crawl_targets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    area_id TEXT,
    vacancy_name TEXT NOT NULL,
    added_at TEXT NOT NULL,
    UNIQUE(area_id, vacancy_name)
);

-- Harvested listings
CREATE TABLE IF NOT EXISTS listings (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id INTEGER,
    name TEXT NOT NULL,
    url TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_external_id ON listings(external_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
