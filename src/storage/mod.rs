//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the harvester:
//! - SQLite database initialization and schema management
//! - Crawl target registry
//! - Listing persistence (single and bulk)
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ListingStore, StorageError, StorageResult};

use crate::output::CrawlReport;
use crate::HarvestError;
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// One (area, search term) pair driving one independent crawl
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrawlTarget {
    /// Area slug as used in the site's search path
    pub area_id: String,

    /// Search term
    pub vacancy_name: String,
}

impl CrawlTarget {
    pub fn new(area_id: impl Into<String>, vacancy_name: impl Into<String>) -> Self {
        Self {
            area_id: area_id.into(),
            vacancy_name: vacancy_name.into(),
        }
    }
}

/// A listing extracted from a result page
///
/// Uniqueness of `external_id` is not enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub external_id: Option<i64>,
    pub name: String,
    pub url: Option<String>,
}

/// A listing as stored in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredListing {
    pub row_id: i64,
    pub listing: ListingRecord,
    pub created_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub targets_loaded: u64,
    pub pages_fetched: u64,
    pub fetches_failed: u64,
    pub listings_collected: u64,
    pub persisted: bool,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished, but the collected listings could not be stored
    PersistFailed,
    /// Ended before crawling because the targets could not be loaded
    Failed,
}

impl RunStatus {
    /// Status a finished run is recorded with
    pub fn for_report(report: &CrawlReport) -> Self {
        if report.targets_unavailable {
            Self::Failed
        } else if report.persisted {
            Self::Completed
        } else {
            Self::PersistFailed
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::PersistFailed => "persist_failed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "persist_failed" => Some(Self::PersistFailed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
