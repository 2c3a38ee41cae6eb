//! Listing-Harvest: a classifieds crawler driven through a rendering proxy
//!
//! This crate fetches search result pages of a classifieds site through an
//! intermediary rendering service, pulls listing records out of the state block
//! embedded in each page, and stores them in SQLite.

pub mod config;
pub mod crawler;
pub mod output;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Listing-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Dispatcher error: {0}")]
    Dispatch(#[from] crawler::DispatchError),
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

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Page parameter '{0}' not found in URL")]
    MissingPageParam(String),

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Listing-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlOrchestrator, FetchOutcome, RequestDispatcher, RequestSpec};
pub use output::CrawlReport;
pub use storage::{CrawlTarget, ListingRecord};
