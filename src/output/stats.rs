//! Statistics generation from the listing database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{ListingStore, RunRecord};
use crate::HarvestError;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct RunStatistics {
    /// Registered crawl targets
    pub total_targets: u64,

    /// Stored listings
    pub total_listings: u64,

    /// Recorded runs
    pub total_runs: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(RunStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn ListingStore) -> Result<RunStatistics, HarvestError> {
    Ok(RunStatistics {
        total_targets: storage.count_targets()?,
        total_listings: storage.count_listings()?,
        total_runs: storage.count_runs()?,
        latest_run: storage.latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Crawl targets: {}", stats.total_targets);
    println!("  Stored listings: {}", stats.total_listings);
    println!("  Recorded runs: {}", stats.total_runs);
    println!();

    let Some(run) = &stats.latest_run else {
        println!("No crawl runs recorded yet.");
        return;
    };

    println!("Latest Run (#{}):", run.id);
    println!("  Status: {}", run.status.to_db_string());
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Config hash: {}", run.config_hash);
    println!("  Targets: {}", run.targets_loaded);
    println!("  Pages fetched: {}", run.pages_fetched);
    println!("  Failed fetches: {}", run.fetches_failed);
    println!("  Listings collected: {}", run.listings_collected);

    let total = run.pages_fetched + run.fetches_failed;
    if total > 0 {
        let success_rate = (run.pages_fetched as f64 / total as f64) * 100.0;
        println!("  Success rate: {:.1}%", success_rate);
    }
}
