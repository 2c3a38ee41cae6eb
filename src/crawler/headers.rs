//! Request header preparation
//!
//! Headers are produced by a pluggable [`HeaderProvider`]. When a provider
//! fails, the dispatcher falls back to [`base_headers`] instead of dropping the
//! request.

use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while building a header set
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("invalid header name: {0}")]
    InvalidName(String),

    #[error("invalid value for header {0}")]
    InvalidValue(String),

    #[error("no browser profile available")]
    NoProfile,
}

/// Builds the header set for one proxied request
pub trait HeaderProvider: Send + Sync {
    /// Returns the headers to send, with `extra` merged over the provider's own
    fn build(&self, extra: &HashMap<String, String>) -> Result<HeaderMap, HeaderError>;
}

/// The minimal header set every proxy request carries
pub fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCEPT_ENCODING,
        HeaderValue::from_static("gzip, deflate, br"),
    );
    headers
}

/// Inserts a string header pair into `headers`
pub fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), HeaderError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| HeaderError::InvalidName(name.to_string()))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|_| HeaderError::InvalidValue(name.to_string()))?;
    headers.insert(header_name, header_value);
    Ok(())
}

/// Desktop platforms a Chrome user agent is drawn from: (client hint, UA fragment)
const PLATFORMS: &[(&str, &str)] = &[
    ("Windows", "Windows NT 10.0; Win64; x64"),
    ("macOS", "Macintosh; Intel Mac OS X 10_15_7"),
    ("Linux", "X11; Linux x86_64"),
];

/// Headers imitating a desktop Chrome browser, with a fresh profile per request
#[derive(Debug, Clone, Default)]
pub struct BrowserHeaders {
    token: Option<String>,
}

impl BrowserHeaders {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl HeaderProvider for BrowserHeaders {
    fn build(&self, extra: &HashMap<String, String>) -> Result<HeaderMap, HeaderError> {
        let mut rng = rand::rng();
        let (platform, os) = PLATFORMS.choose(&mut rng).ok_or(HeaderError::NoProfile)?;
        let version: u32 = rng.random_range(120..=131);

        let mut headers = base_headers();
        insert_header(
            &mut headers,
            "user-agent",
            &format!(
                "Mozilla/5.0 ({os}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{version}.0.0.0 Safari/537.36"
            ),
        )?;
        insert_header(&mut headers, "sec-ch-ua-platform", &format!("\"{platform}\""))?;
        insert_header(
            &mut headers,
            "sec-ch-ua",
            &format!(
                "\"Google Chrome\";v=\"{version}\", \"Chromium\";v=\"{version}\", \"Not/A)Brand\";v=\"24\""
            ),
        )?;

        if let Some(token) = &self.token {
            insert_header(&mut headers, "authorization", &format!("Bearer {token}"))?;
        }

        for (name, value) in extra {
            insert_header(&mut headers, name, value)?;
        }

        Ok(headers)
    }
}
