//! Request and outcome types exchanged with the dispatcher
//!
//! A [`RequestSpec`] fully describes one proxied fetch. Every request submitted to
//! the dispatcher comes back as exactly one [`FetchOutcome`], keyed by the
//! request's `target_url`.

use crate::crawler::validator::ValidationError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// HTTP method used against the rendering proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    /// Payload is sent as query parameters
    Get,
    /// Payload is sent as a JSON body
    #[default]
    Post,
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// One proxied fetch
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// The page the proxy is asked to render; also the correlation key
    pub target_url: String,

    /// Proxy path appended to the dispatcher's base URL
    pub endpoint: String,

    /// Body (POST) or query parameters (GET)
    pub payload: Map<String, Value>,

    /// Extra headers merged over the prepared header set
    pub headers: HashMap<String, String>,
}

impl RequestSpec {
    /// Builds the standard proxy request: `{"url": target_url}` on the default endpoint
    pub fn proxied(target_url: impl Into<String>) -> Self {
        let target_url = target_url.into();
        let mut payload = Map::new();
        payload.insert("url".to_string(), Value::String(target_url.clone()));

        Self {
            target_url,
            endpoint: String::new(),
            payload,
            headers: HashMap::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Renders the payload as query parameters for GET requests
    ///
    /// String values are passed verbatim; anything else is rendered as JSON text.
    pub fn query_params(&self) -> Vec<(String, String)> {
        self.payload
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

/// A decoded proxy response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Body declared as `application/json`
    Json(Value),
    /// Any other body, as text
    Text(String),
}

impl ResponseBody {
    /// Returns the rendered page HTML carried by this response
    ///
    /// JSON responses carry the page under their `text` field.
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Json(value) => value.get("text").and_then(Value::as_str),
            Self::Text(text) => Some(text.as_str()),
        }
    }
}

/// Transport-level failures: the proxy could not produce a usable response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("empty response body")]
    EmptyBody,

    #[error("malformed JSON body: {0}")]
    MalformedJson(String),

    #[error("dispatcher is closed")]
    Closed,
}

impl TransportError {
    /// Classifies a reqwest error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Why a fetch ultimately failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl FetchError {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Closed))
    }
}

/// The result of one dispatched request, correlated by target URL
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The `target_url` of the originating [`RequestSpec`]
    pub target_url: String,

    pub result: Result<ResponseBody, FetchError>,
}

impl FetchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the rendered page HTML of a successful outcome
    pub fn html(&self) -> Option<&str> {
        self.result.as_ref().ok().and_then(ResponseBody::html)
    }
}

/// Errors from dispatcher lifecycle operations
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher already closed")]
    AlreadyClosed,
}
