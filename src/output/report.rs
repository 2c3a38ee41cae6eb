use tracing::info;

/// Counters of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Targets loaded from the store
    pub targets_loaded: usize,

    /// Seed pages that could not be fetched or validated
    pub seeds_failed: usize,

    /// Targets whose first page reported no results
    pub targets_empty: usize,

    /// Requests dispatched, seeds included
    pub pages_requested: usize,

    /// Pages fetched and validated, seeds included
    pub pages_fetched: usize,

    /// Follow-up pages that could not be fetched or validated
    pub pages_failed: usize,

    /// Listings extracted across all pages
    pub listings_collected: usize,

    /// Listings written to the store
    pub listings_persisted: usize,

    /// Whether the collected listings reached the store
    pub persisted: bool,

    /// Set when the targets could not be loaded and nothing was crawled
    pub targets_unavailable: bool,
}

impl CrawlReport {
    /// All failed fetches, seeds and follow-ups
    pub fn failed_fetches(&self) -> usize {
        self.seeds_failed + self.pages_failed
    }

    /// Logs a one-line summary of the run
    pub fn log_summary(&self) {
        info!(
            "Crawl finished: {} targets, {}/{} pages fetched, {} failed, {} listings collected, {} persisted",
            self.targets_loaded,
            self.pages_fetched,
            self.pages_requested,
            self.failed_fetches(),
            self.listings_collected,
            self.listings_persisted
        );
    }

    /// Prints the report to stdout
    pub fn print(&self) {
        println!("=== Crawl Report ===\n");
        if self.targets_unavailable {
            println!("Crawl targets could not be loaded; nothing was crawled");
            return;
        }

        println!("Targets:");
        println!("  Loaded: {}", self.targets_loaded);
        println!("  Seed failures: {}", self.seeds_failed);
        println!("  Without results: {}", self.targets_empty);
        println!();

        println!("Pages:");
        println!("  Requested: {}", self.pages_requested);
        println!("  Fetched: {}", self.pages_fetched);
        println!("  Failed: {}", self.failed_fetches());
        println!();

        println!("Listings:");
        println!("  Collected: {}", self.listings_collected);
        println!("  Persisted: {}", self.listings_persisted);
        if !self.persisted {
            println!("  WARNING: listings were not stored");
        }
    }
}
