//! Crawler module for proxied result page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Proxied fetching with transport and validation retries
//! - Global concurrency limiting
//! - Embedded state extraction from result pages
//! - Overall crawl orchestration

mod dispatcher;
mod extractor;
mod headers;
mod limiter;
mod orchestrator;
mod request;
mod validator;

pub use dispatcher::{Backoff, RequestDispatcher};
pub use extractor::{
    extract_page_state, has_embedded_state, pages_count, PageState, MAX_PAGES, MAX_RESULTS,
    PAGE_SIZE,
};
pub use headers::{base_headers, BrowserHeaders, HeaderError, HeaderProvider};
pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use orchestrator::{CrawlOrchestrator, CrawlSettings};
pub use request::{
    DispatchError, FetchError, FetchOutcome, RequestMethod, RequestSpec, ResponseBody,
    TransportError,
};
pub use validator::{EmbeddedStateValidator, ValidationError, Validator};

use crate::config::Config;
use crate::output::CrawlReport;
use crate::HarvestError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the listing database
/// 2. Build the proxy dispatcher
/// 3. Fetch the first result page of every target
/// 4. Fetch the remaining result pages in chunks
/// 5. Store the collected listings
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash of the configuration, recorded on the run
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The run's counters
/// * `Err(HarvestError)` - The database or the HTTP client could not be set up
pub async fn run_crawl(config: &Config, config_hash: &str) -> Result<CrawlReport, HarvestError> {
    let mut orchestrator = CrawlOrchestrator::from_config(config, config_hash)?;
    let report = orchestrator.run().await;
    orchestrator.dispatcher().close()?;
    Ok(report)
}
