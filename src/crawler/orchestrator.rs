//! Crawl orchestration
//!
//! One run loads the crawl targets, fetches every target's first result page
//! in a single validated batch, fans out to the remaining pages of each target
//! in sequential chunks, and stores all collected listings at the end.

use crate::config::{Config, SiteConfig};
use crate::crawler::dispatcher::RequestDispatcher;
use crate::crawler::extractor::{extract_page_state, PageState};
use crate::crawler::request::{FetchOutcome, RequestMethod, RequestSpec};
use crate::crawler::validator::{EmbeddedStateValidator, Validator};
use crate::output::CrawlReport;
use crate::storage::{CrawlTarget, ListingRecord, ListingStore, SqliteStorage};
use crate::url::{search_url, PageUrlTemplate};
use crate::HarvestError;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Run parameters taken from the configuration
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub site: SiteConfig,
    pub endpoint: String,
    pub method: RequestMethod,
    pub chunk_size: usize,
    pub target_limit: Option<usize>,
    pub validation_retries: u32,
    pub config_hash: String,
}

impl CrawlSettings {
    pub fn from_config(config: &Config, config_hash: impl Into<String>) -> Self {
        Self {
            site: config.site.clone(),
            endpoint: config.proxy.endpoint.clone(),
            method: config.proxy.method,
            chunk_size: config.crawler.chunk_size as usize,
            target_limit: config.crawler.target_limit.map(|l| l as usize),
            validation_retries: config.dispatcher.validation_retries,
            config_hash: config_hash.into(),
        }
    }
}

/// Drives crawl runs against a listing store
pub struct CrawlOrchestrator<S: ListingStore> {
    dispatcher: RequestDispatcher,
    store: S,
    settings: CrawlSettings,
    validator: EmbeddedStateValidator,
}

impl CrawlOrchestrator<SqliteStorage> {
    /// Builds an orchestrator backed by the configured SQLite database
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the HTTP client cannot be built.
    pub fn from_config(config: &Config, config_hash: &str) -> Result<Self, HarvestError> {
        let dispatcher = RequestDispatcher::new(&config.proxy, &config.dispatcher)?;
        let store = SqliteStorage::new(Path::new(&config.output.database_path))?;

        Ok(Self::new(
            dispatcher,
            store,
            CrawlSettings::from_config(config, config_hash),
        ))
    }
}

impl<S: ListingStore> CrawlOrchestrator<S> {
    pub fn new(dispatcher: RequestDispatcher, store: S, settings: CrawlSettings) -> Self {
        Self {
            dispatcher,
            store,
            settings,
            validator: EmbeddedStateValidator,
        }
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Executes one crawl run
    ///
    /// Individual fetch or storage failures are logged and counted; they never
    /// abort the run.
    pub async fn run(&mut self) -> CrawlReport {
        let run_id = match self.store.start_run(&self.settings.config_hash) {
            Ok(id) => {
                info!("Starting crawl run {}", id);
                Some(id)
            }
            Err(e) => {
                warn!("Failed to record run start: {}", e);
                None
            }
        };

        let mut report = CrawlReport::default();
        if let Some(listings) = self.crawl(&mut report).await {
            self.persist(&listings, &mut report);
        }

        if let Some(run_id) = run_id {
            if let Err(e) = self.store.finish_run(run_id, &report) {
                warn!("Failed to record run {} finish: {}", run_id, e);
            }
        }

        report.log_summary();
        report
    }

    /// Fetches every target and returns the collected listings
    ///
    /// Returns `None` when the targets cannot be loaded.
    async fn crawl(&self, report: &mut CrawlReport) -> Option<Vec<ListingRecord>> {
        let targets = match self.store.list_targets(self.settings.target_limit) {
            Ok(targets) => targets,
            Err(e) => {
                error!("Failed to load crawl targets: {}", e);
                report.targets_unavailable = true;
                return None;
            }
        };

        report.targets_loaded = targets.len();
        info!("Loaded {} crawl targets", targets.len());

        let mut listings = Vec::new();
        if targets.is_empty() {
            return Some(listings);
        }

        let seeds: Vec<(String, &CrawlTarget)> = targets
            .iter()
            .map(|target| (search_url(&self.settings.site, target), target))
            .collect();
        let by_url: HashMap<&str, &CrawlTarget> =
            seeds.iter().map(|(url, target)| (url.as_str(), *target)).collect();

        let outcomes = self
            .fetch_batch(seeds.iter().map(|(url, _)| url.as_str()), report)
            .await;

        for outcome in outcomes {
            let Some(target) = by_url.get(outcome.target_url.as_str()) else {
                warn!("Outcome for unknown seed {}", outcome.target_url);
                continue;
            };

            let Some(html) = outcome.html() else {
                report.seeds_failed += 1;
                warn!(
                    "Seed page failed for {} / {}",
                    target.area_id, target.vacancy_name
                );
                continue;
            };
            report.pages_fetched += 1;

            let state = extract_page_state(html);
            let pages = state.pages_count();
            if pages == 0 {
                report.targets_empty += 1;
                info!(
                    "No results for {} / {}",
                    target.area_id, target.vacancy_name
                );
                continue;
            }

            debug!(
                "{} / {}: {} results over {} pages",
                target.area_id, target.vacancy_name, state.total_count, pages
            );
            listings.extend(state.listings(&self.settings.site.base_url));

            let follow_ups = self.follow_up_urls(&state, pages);
            self.fetch_follow_ups(&follow_ups, &mut listings, report)
                .await;
        }

        report.listings_collected = listings.len();
        Some(listings)
    }

    /// Follow-up page URLs advertised by a seed page
    fn follow_up_urls(&self, state: &PageState, pages: u32) -> Vec<String> {
        let Some(last_page) = &state.last_page_url else {
            return Vec::new();
        };

        let site = &self.settings.site;
        match PageUrlTemplate::from_last_page(&site.base_url, last_page, &site.page_param) {
            Ok(template) => {
                debug!("Page template {}", template.pattern());
                template.follow_up_urls(pages)
            }
            Err(e) => {
                warn!("Cannot derive page URLs from {}: {}", last_page, e);
                Vec::new()
            }
        }
    }

    /// Fetches follow-up pages chunk by chunk; a chunk starts after the previous one resolved
    async fn fetch_follow_ups(
        &self,
        urls: &[String],
        listings: &mut Vec<ListingRecord>,
        report: &mut CrawlReport,
    ) {
        for chunk in urls.chunks(self.settings.chunk_size.max(1)) {
            let outcomes = self
                .fetch_batch(chunk.iter().map(String::as_str), report)
                .await;

            for outcome in outcomes {
                match outcome.html() {
                    Some(html) => {
                        report.pages_fetched += 1;
                        let state = extract_page_state(html);
                        listings.extend(state.listings(&self.settings.site.base_url));
                    }
                    None => {
                        report.pages_failed += 1;
                        warn!("Result page failed: {}", outcome.target_url);
                    }
                }
            }
        }
    }

    async fn fetch_batch<'a>(
        &self,
        urls: impl Iterator<Item = &'a str>,
        report: &mut CrawlReport,
    ) -> Vec<FetchOutcome> {
        let requests: Vec<RequestSpec> = urls
            .map(|url| RequestSpec::proxied(url).with_endpoint(self.settings.endpoint.clone()))
            .collect();
        report.pages_requested += requests.len();

        let validator: &dyn Validator = &self.validator;
        self.dispatcher
            .execute_concurrently(
                requests,
                self.settings.method,
                Some(validator),
                self.settings.validation_retries,
            )
            .await
    }

    fn persist(&mut self, listings: &[ListingRecord], report: &mut CrawlReport) {
        if listings.is_empty() {
            report.persisted = true;
            return;
        }

        match self.store.bulk_insert_listings(listings) {
            Ok(count) => {
                report.listings_persisted = count;
                report.persisted = true;
                info!("Stored {} listings", count);
            }
            Err(e) => {
                error!("Failed to store {} listings: {}", listings.len(), e);
            }
        }
    }
}
