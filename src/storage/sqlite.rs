//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ListingStore trait.

use crate::output::CrawlReport;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ListingStore, StorageError, StorageResult};
use crate::storage::{CrawlTarget, ListingRecord, RunRecord, RunStatus, StoredListing};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, targets_loaded, \
                           pages_fetched, fetches_failed, listings_collected, persisted";

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
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        targets_loaded: row.get::<_, i64>(5)? as u64,
        pages_fetched: row.get::<_, i64>(6)? as u64,
        fetches_failed: row.get::<_, i64>(7)? as u64,
        listings_collected: row.get::<_, i64>(8)? as u64,
        persisted: row.get::<_, i64>(9)? != 0,
    })
}

fn count(conn: &Connection, sql: &str) -> StorageResult<u64> {
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

impl ListingStore for SqliteStorage {
    // ===== Crawl Targets =====

    fn list_targets(&self, limit: Option<usize>) -> StorageResult<Vec<CrawlTarget>> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = self.conn.prepare(
            "SELECT area_id, vacancy_name FROM crawl_targets
             WHERE area_id IS NOT NULL AND TRIM(area_id) != ''
             ORDER BY id ASC
             LIMIT ?1",
        )?;

        let targets = stmt
            .query_map(params![limit], |row| {
                Ok(CrawlTarget {
                    area_id: row.get(0)?,
                    vacancy_name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(targets)
    }

    fn add_target(&mut self, target: &CrawlTarget) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO crawl_targets (area_id, vacancy_name, added_at)
             VALUES (?1, ?2, ?3)",
            params![target.area_id, target.vacancy_name, now],
        )?;
        Ok(inserted > 0)
    }

    fn count_targets(&self) -> StorageResult<u64> {
        count(&self.conn, "SELECT COUNT(*) FROM crawl_targets")
    }

    // ===== Listings =====

    fn insert_listing(&mut self, listing: &ListingRecord) -> StorageResult<StoredListing> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO listings (external_id, name, url, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![listing.external_id, listing.name, listing.url, now],
        )?;

        Ok(StoredListing {
            row_id: self.conn.last_insert_rowid(),
            listing: listing.clone(),
            created_at: now,
        })
    }

    fn bulk_insert_listings(&mut self, listings: &[ListingRecord]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO listings (external_id, name, url, created_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for listing in listings {
                stmt.execute(params![listing.external_id, listing.name, listing.url, now])?;
            }
        }

        tx.commit()?;
        Ok(listings.len())
    }

    fn count_listings(&self) -> StorageResult<u64> {
        count(&self.conn, "SELECT COUNT(*) FROM listings")
    }

    // ===== Run Management =====

    fn start_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, report: &CrawlReport) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let status = RunStatus::for_report(report);

        let updated = self.conn.execute(
            "UPDATE runs SET
                finished_at = ?1,
                status = ?2,
                targets_loaded = ?3,
                pages_fetched = ?4,
                fetches_failed = ?5,
                listings_collected = ?6,
                persisted = ?7
             WHERE id = ?8",
            params![
                now,
                status.to_db_string(),
                report.targets_loaded as i64,
                report.pages_fetched as i64,
                report.failed_fetches() as i64,
                report.listings_collected as i64,
                report.persisted as i64,
                run_id,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }

        Ok(())
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn count_runs(&self) -> StorageResult<u64> {
        count(&self.conn, "SELECT COUNT(*) FROM runs")
    }
}
