//! Storage traits and error types
//!
//! This module defines the repository interface the crawler persists through
//! and the associated error types.

use crate::output::CrawlReport;
use crate::storage::{CrawlTarget, ListingRecord, RunRecord, StoredListing};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Repository the crawler reads targets from and writes listings to
///
/// Implementations report failures as `StorageError`; the orchestrator
/// decides how much of a run a failure affects.
pub trait ListingStore {
    // ===== Crawl Targets =====

    /// Returns crawl targets with a non-empty area id, in insertion order
    ///
    /// # Arguments
    ///
    /// * `limit` - Maximum number of targets to return (`None` for all)
    fn list_targets(&self, limit: Option<usize>) -> StorageResult<Vec<CrawlTarget>>;

    /// Registers a crawl target; registering an existing target is a no-op
    ///
    /// # Returns
    ///
    /// `true` if the target was newly added
    fn add_target(&mut self, target: &CrawlTarget) -> StorageResult<bool>;

    /// Counts registered crawl targets
    fn count_targets(&self) -> StorageResult<u64>;

    // ===== Listings =====

    /// Inserts a single listing
    fn insert_listing(&mut self, listing: &ListingRecord) -> StorageResult<StoredListing>;

    /// Inserts listings in one transaction; either all are stored or none
    ///
    /// # Returns
    ///
    /// The number of listings stored
    fn bulk_insert_listings(&mut self, listings: &[ListingRecord]) -> StorageResult<usize>;

    /// Counts stored listings
    fn count_listings(&self) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn start_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records a run's counters and marks it finished
    fn finish_run(&mut self, run_id: i64, report: &CrawlReport) -> StorageResult<()>;

    /// Gets the most recent run
    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Counts recorded runs
    fn count_runs(&self) -> StorageResult<u64>;
}
