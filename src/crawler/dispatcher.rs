//! Proxied fetch dispatcher
//!
//! This module sends [`RequestSpec`]s to the rendering proxy, including:
//! - Building the HTTP client and the proxy URL
//! - Transport retries with linear, capped backoff
//! - An optional validation phase with its own retry budget
//! - Content negotiation (JSON or text, manual deflate inflation)
//! - Batch execution under a shared concurrency limit

use crate::config::{DispatcherConfig, ProxyConfig};
use crate::crawler::headers::{base_headers, BrowserHeaders, HeaderProvider};
use crate::crawler::limiter::ConcurrencyLimiter;
use crate::crawler::request::{
    DispatchError, FetchError, FetchOutcome, RequestMethod, RequestSpec, ResponseBody,
    TransportError,
};
use crate::crawler::validator::{ValidationError, Validator};
use crate::HarvestError;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderName, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Linear backoff: `min(base * (attempt + 1), max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay to wait after the given 1-based attempt failed
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(attempt.saturating_add(1))
            .min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(5))
    }
}

impl From<&DispatcherConfig> for Backoff {
    fn from(config: &DispatcherConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }
}

/// Sends proxied requests with retries under a global concurrency limit
///
/// Every submitted [`RequestSpec`] produces exactly one [`FetchOutcome`];
/// failures are carried in the outcome and never returned as errors.
pub struct RequestDispatcher {
    client: Mutex<Option<Client>>,
    limiter: ConcurrencyLimiter,
    headers: Box<dyn HeaderProvider>,
    base_url: String,
    transport_retries: u32,
    backoff: Backoff,
    closed: AtomicBool,
}

impl RequestDispatcher {
    /// Creates a dispatcher for the configured proxy
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(proxy: &ProxyConfig, config: &DispatcherConfig) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .timeout(proxy.timeout())
            .connect_timeout(proxy.timeout())
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client: Mutex::new(Some(client)),
            limiter: ConcurrencyLimiter::new(config.max_concurrent as usize),
            headers: Box::new(BrowserHeaders::new(proxy.token.clone())),
            base_url: proxy.base_url.clone(),
            transport_retries: config.transport_retries,
            backoff: Backoff::from(config),
            closed: AtomicBool::new(false),
        })
    }

    /// Replaces the header provider
    pub fn with_header_provider(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.headers = Box::new(provider);
        self
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Proxy URL for an endpoint: `{base}/{endpoint}` without stray slashes
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        url.trim_end_matches('/').to_string()
    }

    /// Runs all requests concurrently and returns one outcome per request
    ///
    /// Outcomes come back in completion-independent order; correlate them by
    /// `target_url`. With a `validator`, a body it rejects is re-fetched up to
    /// `validation_retries` times.
    pub async fn execute_concurrently(
        &self,
        requests: Vec<RequestSpec>,
        method: RequestMethod,
        validator: Option<&dyn Validator>,
        validation_retries: u32,
    ) -> Vec<FetchOutcome> {
        if requests.is_empty() {
            return Vec::new();
        }

        debug!(
            "Dispatching batch of {} {} requests (limit {})",
            requests.len(),
            method,
            self.limiter.max_concurrent()
        );

        let fetches = requests
            .iter()
            .map(|request| self.dispatch(request, method, validator, validation_retries));

        join_all(fetches).await
    }

    /// Closes the dispatcher, releasing the HTTP client
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::AlreadyClosed` on every call after the first.
    pub fn close(&self) -> Result<(), DispatchError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::AlreadyClosed);
        }

        if let Ok(mut client) = self.client.lock() {
            client.take();
        }
        self.limiter.close();

        debug!("Dispatcher closed");
        Ok(())
    }

    async fn dispatch(
        &self,
        request: &RequestSpec,
        method: RequestMethod,
        validator: Option<&dyn Validator>,
        validation_retries: u32,
    ) -> FetchOutcome {
        let result = self
            .fetch_validated(request, method, validator, validation_retries)
            .await;

        if let Err(e) = &result {
            warn!("Giving up on {}: {}", request.target_url, e);
        }

        FetchOutcome {
            target_url: request.target_url.clone(),
            result,
        }
    }

    async fn fetch_validated(
        &self,
        request: &RequestSpec,
        method: RequestMethod,
        validator: Option<&dyn Validator>,
        validation_retries: u32,
    ) -> Result<ResponseBody, FetchError> {
        let url = self.endpoint_url(&request.endpoint);
        let headers = self.prepare_headers(&request.headers);

        let body = self.fetch_with_retry(&url, request, method, &headers).await?;

        let Some(validator) = validator else {
            return Ok(body);
        };

        let mut current: Result<ResponseBody, FetchError> = Ok(body);
        let mut retries = 0;

        loop {
            let failure = match current {
                Ok(body) => match validator.validate(&body) {
                    Ok(true) => return Ok(body),
                    Ok(false) => FetchError::Validation(ValidationError::Rejected),
                    Err(e) => FetchError::Validation(e),
                },
                Err(e) => e,
            };

            if retries >= validation_retries || failure.is_closed() {
                return Err(failure);
            }

            retries += 1;
            let delay = self.backoff.delay(retries);
            warn!(
                "Validation retry {}/{} for {} in {:?}: {}",
                retries, validation_retries, request.target_url, delay, failure
            );
            tokio::time::sleep(delay).await;

            current = self
                .attempt(&url, request, method, &headers)
                .await
                .map_err(FetchError::from);
        }
    }

    async fn fetch_with_retry(
        &self,
        url: &str,
        request: &RequestSpec,
        method: RequestMethod,
        headers: &HeaderMap,
    ) -> Result<ResponseBody, TransportError> {
        let attempts = self.transport_retries.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(url, request, method, headers).await {
                Ok(body) => return Ok(body),
                Err(e) if e == TransportError::Closed || attempt >= attempts => return Err(e),
                Err(e) => {
                    let delay = self.backoff.delay(attempt);
                    debug!(
                        "Attempt {}/{} for {} failed, retrying in {:?}: {}",
                        attempt, attempts, request.target_url, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One fetch attempt; holds a limiter slot until the body is read
    async fn attempt(
        &self,
        url: &str,
        request: &RequestSpec,
        method: RequestMethod,
        headers: &HeaderMap,
    ) -> Result<ResponseBody, TransportError> {
        let client = self.client()?;
        let _permit = self.limiter.acquire().await?;

        let builder = match method {
            RequestMethod::Post => client.post(url).json(&request.payload),
            RequestMethod::Get => client.get(url).query(&request.query_params()),
        };

        let response = builder
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        read_body(response).await
    }

    fn client(&self) -> Result<Client, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let guard = self.client.lock().map_err(|_| TransportError::Closed)?;
        guard.clone().ok_or(TransportError::Closed)
    }

    fn prepare_headers(&self, extra: &HashMap<String, String>) -> HeaderMap {
        match self.headers.build(extra) {
            Ok(headers) => headers,
            Err(e) => {
                warn!("Header preparation failed, using base headers: {}", e);
                base_headers()
            }
        }
    }
}

async fn read_body(response: Response) -> Result<ResponseBody, TransportError> {
    let header = |name: HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase()
    };
    let content_type = header(CONTENT_TYPE);
    let content_encoding = header(CONTENT_ENCODING);

    let raw = response
        .bytes()
        .await
        .map_err(|e| TransportError::Body(e.to_string()))?;

    decode_body(&content_type, &content_encoding, &raw)
}

/// Turns a raw response body into a [`ResponseBody`]
fn decode_body(
    content_type: &str,
    content_encoding: &str,
    raw: &[u8],
) -> Result<ResponseBody, TransportError> {
    if raw.is_empty() {
        return Err(TransportError::EmptyBody);
    }

    let inflated;
    let bytes = if content_encoding.contains("deflate") {
        inflated = inflate(raw)?;
        inflated.as_slice()
    } else {
        raw
    };

    if bytes.is_empty() {
        return Err(TransportError::EmptyBody);
    }

    if content_type.contains("application/json") {
        serde_json::from_slice(bytes)
            .map(ResponseBody::Json)
            .map_err(|e| TransportError::MalformedJson(e.to_string()))
    } else {
        Ok(ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()))
    }
}

/// Inflates a deflate body, zlib-wrapped or raw
fn inflate(raw: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::new();
    if ZlibDecoder::new(raw).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }

    out.clear();
    DeflateDecoder::new(raw)
        .read_to_end(&mut out)
        .map_err(|e| TransportError::Body(format!("deflate: {}", e)))?;
    Ok(out)
}
