//! End-to-end crawl runs against a mock proxy

use crate::{blocked_page, dispatcher, fast_dispatcher_config, proxy_response, result_page};
use listing_harvest::config::SiteConfig;
use listing_harvest::crawler::{CrawlOrchestrator, CrawlSettings, RequestMethod};
use listing_harvest::output::CrawlReport;
use listing_harvest::storage::{
    CrawlTarget, ListingRecord, ListingStore, RunRecord, RunStatus, SqliteStorage, StorageError,
    StorageResult, StoredListing,
};
use serde_json::json;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOK_SEED: &str = "https://www.avito.ru/moskva/vakansii?cd=1&q=cook&s=104";
const DRIVER_SEED: &str = "https://www.avito.ru/kazan/vakansii?cd=1&q=driver&s=104";

fn settings(chunk_size: usize) -> CrawlSettings {
    CrawlSettings {
        site: SiteConfig::default(),
        endpoint: "render".to_string(),
        method: RequestMethod::Post,
        chunk_size,
        target_limit: None,
        validation_retries: 1,
        config_hash: "integration".to_string(),
    }
}

fn store_with_targets(targets: &[(&str, &str)]) -> SqliteStorage {
    let mut store = SqliteStorage::new_in_memory().expect("Failed to open store");
    for (area, query) in targets {
        store
            .add_target(&CrawlTarget::new(*area, *query))
            .expect("Failed to add target");
    }
    store
}

async fn mount_page(server: &MockServer, target_url: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/render"))
        .and(body_json(json!({ "url": target_url })))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_single_page_target_is_persisted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/render"))
        .and(body_json(json!({ "url": COOK_SEED })))
        .respond_with(proxy_response(&result_page(
            30,
            &[(101, "Line cook"), (102, "Sous chef"), (103, "Pastry cook")],
            None,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_with_targets(&[("moskva", "cook")]);
    let dispatcher = dispatcher(&mock_server.uri(), &fast_dispatcher_config(4, 2));
    let mut orchestrator = CrawlOrchestrator::new(dispatcher, store, settings(10));

    let report = orchestrator.run().await;

    assert_eq!(report.targets_loaded, 1);
    assert_eq!(report.pages_requested, 1);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.listings_collected, 3);
    assert_eq!(report.listings_persisted, 3);
    assert!(report.persisted);

    let store = orchestrator.into_store();
    assert_eq!(store.count_listings().unwrap(), 3);

    let run = store.latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "integration");
    assert_eq!(run.listings_collected, 3);
}

#[tokio::test]
async fn test_failing_target_does_not_abort_run() {
    let mock_server = MockServer::start().await;

    // Initial fetch plus one validation retry
    Mock::given(method("POST"))
        .and(path("/render"))
        .and(body_json(json!({ "url": COOK_SEED })))
        .respond_with(proxy_response(&blocked_page()))
        .expect(2)
        .mount(&mock_server)
        .await;

    mount_page(
        &mock_server,
        DRIVER_SEED,
        proxy_response(&result_page(2, &[(201, "Truck driver"), (202, "Courier")], None)),
    )
    .await;

    let store = store_with_targets(&[("moskva", "cook"), ("kazan", "driver")]);
    let dispatcher = dispatcher(&mock_server.uri(), &fast_dispatcher_config(4, 2));
    let mut orchestrator = CrawlOrchestrator::new(dispatcher, store, settings(10));

    let report = orchestrator.run().await;

    assert_eq!(report.targets_loaded, 2);
    assert_eq!(report.seeds_failed, 1);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.listings_collected, 2);
    assert!(report.persisted);
    assert_eq!(orchestrator.store().count_listings().unwrap(), 2);
}

#[tokio::test]
async fn test_empty_target_is_skipped() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        COOK_SEED,
        proxy_response(&result_page(
            0,
            &[],
            Some("/moskva/vakansii?cd=1&p=5&q=cook&s=104"),
        )),
    )
    .await;

    let store = store_with_targets(&[("moskva", "cook")]);
    let dispatcher = dispatcher(&mock_server.uri(), &fast_dispatcher_config(4, 1));
    let mut orchestrator = CrawlOrchestrator::new(dispatcher, store, settings(10));

    let report = orchestrator.run().await;

    assert_eq!(report.targets_empty, 1);
    assert_eq!(report.pages_requested, 1);
    assert_eq!(report.listings_collected, 0);
    assert!(report.persisted);
}

#[tokio::test]
async fn test_follow_up_pages_are_fetched_in_chunks() {
    let mock_server = MockServer::start().await;

    let last_page = "/moskva/vakansii?cd=1&amp;p=3&amp;q=cook&amp;s=104";
    mount_page(
        &mock_server,
        COOK_SEED,
        proxy_response(&result_page(120, &[(1, "Cook"), (2, "Chef")], Some(last_page))),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/render"))
        .and(body_json(json!({
            "url": "https://www.avito.ru/moskva/vakansii?cd=1&p=2&q=cook&s=104"
        })))
        .respond_with(proxy_response(&result_page(
            120,
            &[(3, "Cook assistant"), (4, "Baker"), (5, "Dishwasher")],
            None,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Page 3 keeps failing and is skipped after its transport attempts
    Mock::given(method("POST"))
        .and(path("/render"))
        .and(body_json(json!({
            "url": "https://www.avito.ru/moskva/vakansii?cd=1&p=3&q=cook&s=104"
        })))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&mock_server)
        .await;

    let store = store_with_targets(&[("moskva", "cook")]);
    let dispatcher = dispatcher(&mock_server.uri(), &fast_dispatcher_config(4, 2));
    let mut orchestrator = CrawlOrchestrator::new(dispatcher, store, settings(1));

    let report = orchestrator.run().await;

    assert_eq!(report.pages_requested, 3);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.pages_failed, 1);
    assert_eq!(report.listings_collected, 5);
    assert_eq!(orchestrator.store().count_listings().unwrap(), 5);

    let run = orchestrator.store().latest_run().unwrap().unwrap();
    assert_eq!(run.pages_fetched, 2);
    assert_eq!(run.fetches_failed, 1);
}

#[tokio::test]
async fn test_chunks_run_one_after_another() {
    let mock_server = MockServer::start().await;
    let delay = Duration::from_millis(100);

    let last_page = "/moskva/vakansii?cd=1&amp;p=6&amp;q=cook&amp;s=104";
    Mock::given(method("POST"))
        .and(path("/render"))
        .respond_with(
            proxy_response(&result_page(300, &[(1, "Cook")], Some(last_page))).set_delay(delay),
        )
        .expect(6)
        .mount(&mock_server)
        .await;

    let store = store_with_targets(&[("moskva", "cook")]);
    let dispatcher = dispatcher(&mock_server.uri(), &fast_dispatcher_config(10, 1));
    let mut orchestrator = CrawlOrchestrator::new(dispatcher, store, settings(2));

    let started = Instant::now();
    let report = orchestrator.run().await;
    let elapsed = started.elapsed();

    // Seed, then follow-up pages 2..=6 in chunks of two
    assert_eq!(report.pages_requested, 6);
    assert_eq!(report.pages_fetched, 6);
    assert_eq!(orchestrator.dispatcher().limiter().peak_in_flight(), 2);
    assert_eq!(orchestrator.dispatcher().limiter().in_flight(), 0);
    assert!(
        elapsed >= delay * 4,
        "seed and three chunks finished in only {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_target_limit_bounds_seed_batch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/render"))
        .respond_with(proxy_response(&result_page(1, &[(9, "Cook")], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_with_targets(&[("moskva", "cook"), ("kazan", "driver")]);
    let dispatcher = dispatcher(&mock_server.uri(), &fast_dispatcher_config(4, 1));
    let mut orchestrator = CrawlOrchestrator::new(
        dispatcher,
        store,
        CrawlSettings {
            target_limit: Some(1),
            ..settings(10)
        },
    );

    let report = orchestrator.run().await;
    assert_eq!(report.targets_loaded, 1);
    assert_eq!(report.pages_requested, 1);
}

#[tokio::test]
async fn test_run_against_database_file() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        COOK_SEED,
        proxy_response(&result_page(1, &[(7, "Cook")], None)),
    )
    .await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("listings.db");

    {
        let mut store = SqliteStorage::new(&db_path).unwrap();
        store.add_target(&CrawlTarget::new("moskva", "cook")).unwrap();
    }

    let store = SqliteStorage::new(&db_path).unwrap();
    let dispatcher = dispatcher(&mock_server.uri(), &fast_dispatcher_config(2, 1));
    let mut orchestrator = CrawlOrchestrator::new(dispatcher, store, settings(10));
    orchestrator.run().await;
    drop(orchestrator);

    let reopened = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(reopened.count_listings().unwrap(), 1);
    assert_eq!(reopened.count_runs().unwrap(), 1);
}

/// Store that serves targets but refuses to write listings
struct ReadOnlyStore {
    inner: SqliteStorage,
}

impl ListingStore for ReadOnlyStore {
    fn list_targets(&self, limit: Option<usize>) -> StorageResult<Vec<CrawlTarget>> {
        self.inner.list_targets(limit)
    }
    fn add_target(&mut self, target: &CrawlTarget) -> StorageResult<bool> {
        self.inner.add_target(target)
    }
    fn count_targets(&self) -> StorageResult<u64> {
        self.inner.count_targets()
    }
    fn insert_listing(&mut self, _listing: &ListingRecord) -> StorageResult<StoredListing> {
        Err(StorageError::Database("read-only".to_string()))
    }
    fn bulk_insert_listings(&mut self, _listings: &[ListingRecord]) -> StorageResult<usize> {
        Err(StorageError::Database("read-only".to_string()))
    }
    fn count_listings(&self) -> StorageResult<u64> {
        self.inner.count_listings()
    }
    fn start_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.inner.start_run(config_hash)
    }
    fn finish_run(&mut self, run_id: i64, report: &CrawlReport) -> StorageResult<()> {
        self.inner.finish_run(run_id, report)
    }
    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.inner.latest_run()
    }
    fn count_runs(&self) -> StorageResult<u64> {
        self.inner.count_runs()
    }
}

#[tokio::test]
async fn test_persistence_failure_is_reported_not_raised() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        COOK_SEED,
        proxy_response(&result_page(2, &[(1, "Cook"), (2, "Chef")], None)),
    )
    .await;

    let store = ReadOnlyStore {
        inner: store_with_targets(&[("moskva", "cook")]),
    };
    let dispatcher = dispatcher(&mock_server.uri(), &fast_dispatcher_config(2, 1));
    let mut orchestrator = CrawlOrchestrator::new(dispatcher, store, settings(10));

    let report = orchestrator.run().await;

    assert_eq!(report.listings_collected, 2);
    assert_eq!(report.listings_persisted, 0);
    assert!(!report.persisted);

    let run = orchestrator.store().latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::PersistFailed);
    assert!(!run.persisted);
}

/// Store whose target table cannot be read but whose run bookkeeping works
struct TargetlessStore {
    inner: SqliteStorage,
}

impl ListingStore for TargetlessStore {
    fn list_targets(&self, _limit: Option<usize>) -> StorageResult<Vec<CrawlTarget>> {
        Err(StorageError::Database("no such column: area_id".to_string()))
    }
    fn add_target(&mut self, target: &CrawlTarget) -> StorageResult<bool> {
        self.inner.add_target(target)
    }
    fn count_targets(&self) -> StorageResult<u64> {
        self.inner.count_targets()
    }
    fn insert_listing(&mut self, listing: &ListingRecord) -> StorageResult<StoredListing> {
        self.inner.insert_listing(listing)
    }
    fn bulk_insert_listings(&mut self, listings: &[ListingRecord]) -> StorageResult<usize> {
        self.inner.bulk_insert_listings(listings)
    }
    fn count_listings(&self) -> StorageResult<u64> {
        self.inner.count_listings()
    }
    fn start_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.inner.start_run(config_hash)
    }
    fn finish_run(&mut self, run_id: i64, report: &CrawlReport) -> StorageResult<()> {
        self.inner.finish_run(run_id, report)
    }
    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.inner.latest_run()
    }
    fn count_runs(&self) -> StorageResult<u64> {
        self.inner.count_runs()
    }
}

#[tokio::test]
async fn test_unloadable_targets_are_recorded_as_failed_run() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = TargetlessStore {
        inner: SqliteStorage::new_in_memory().expect("Failed to open store"),
    };
    let dispatcher = dispatcher(&mock_server.uri(), &fast_dispatcher_config(2, 1));
    let mut orchestrator = CrawlOrchestrator::new(dispatcher, store, settings(10));

    let report = orchestrator.run().await;

    assert!(report.targets_unavailable);
    assert_eq!(report.pages_requested, 0);
    assert_eq!(report.listings_collected, 0);

    let run = orchestrator.store().latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.finished_at.is_some());
    assert!(!run.persisted);
}
