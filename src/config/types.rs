use crate::crawler::RequestMethod;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Listing-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub site: SiteConfig,
    pub output: OutputConfig,
}

/// Rendering proxy connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Base URL of the rendering proxy
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path appended to the base URL for every request
    #[serde(default)]
    pub endpoint: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,

    /// Per-attempt request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// HTTP method used against the proxy
    #[serde(default)]
    pub method: RequestMethod,
}

impl ProxyConfig {
    /// Creates a proxy configuration with defaults for everything but the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            endpoint: String::new(),
            token: None,
            timeout_secs: default_timeout_secs(),
            method: RequestMethod::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Concurrency and retry limits for the request dispatcher
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum number of in-flight proxy requests
    #[serde(rename = "max-concurrent", default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Maximum transport attempts per request
    #[serde(rename = "transport-retries", default = "default_transport_retries")]
    pub transport_retries: u32,

    /// Re-fetches allowed after a response fails validation
    #[serde(rename = "validation-retries", default = "default_validation_retries")]
    pub validation_retries: u32,

    /// Backoff step between attempts (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff sleep (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            transport_retries: default_transport_retries(),
            validation_retries: default_validation_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Crawl orchestration settings
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of follow-up pages fetched per dispatcher batch
    #[serde(rename = "chunk-size", default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Maximum number of crawl targets loaded per run
    #[serde(rename = "target-limit", default)]
    pub target_limit: Option<u32>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            target_limit: None,
        }
    }
}

/// Classifieds site layout
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site origin, used for seed URLs and relative listing paths
    #[serde(rename = "base-url", default = "default_site_base_url")]
    pub base_url: String,

    /// Search path with `{area}` and `{query}` placeholders
    #[serde(rename = "search-path", default = "default_search_path")]
    pub search_path: String,

    /// Query parameter carrying the page number
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_site_base_url(),
            search_path: default_search_path(),
            page_param: default_page_param(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent() -> u32 {
    10
}

fn default_transport_retries() -> u32 {
    3
}

fn default_validation_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    5000
}

fn default_chunk_size() -> u32 {
    10
}

fn default_site_base_url() -> String {
    "https://www.avito.ru".to_string()
}

fn default_search_path() -> String {
    "/{area}/vakansii?cd=1&q={query}&s=104".to_string()
}

fn default_page_param() -> String {
    "p".to_string()
}
