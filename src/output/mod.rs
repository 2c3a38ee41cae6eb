//! Output module for crawl reports and statistics
//!
//! This module handles:
//! - The per-run `CrawlReport` counters and their summary
//! - Statistics loaded back from the listing database

mod report;
pub mod stats;

pub use report::CrawlReport;
pub use stats::{load_statistics, print_statistics, RunStatistics};
