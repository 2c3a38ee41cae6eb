//! Response validation strategies
//!
//! A [`Validator`] decides whether a transport-successful response is usable.
//! Rejections drive the dispatcher's validation retries.

use crate::crawler::extractor::has_embedded_state;
use crate::crawler::request::ResponseBody;
use thiserror::Error;

/// Why a response failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("response rejected by validator")]
    Rejected,

    #[error("response carries no page HTML")]
    MissingHtml,

    #[error("validator failed: {0}")]
    Failed(String),
}

/// Checks the content of a transport-successful response
///
/// `Ok(false)` and `Err(_)` both count as a failed validation.
pub trait Validator: Send + Sync {
    fn validate(&self, body: &ResponseBody) -> Result<bool, ValidationError>;
}

impl<F> Validator for F
where
    F: Fn(&ResponseBody) -> bool + Send + Sync,
{
    fn validate(&self, body: &ResponseBody) -> Result<bool, ValidationError> {
        Ok(self(body))
    }
}

/// Accepts responses whose page carries the embedded application state block
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedStateValidator;

impl Validator for EmbeddedStateValidator {
    fn validate(&self, body: &ResponseBody) -> Result<bool, ValidationError> {
        let html = body.html().ok_or(ValidationError::MissingHtml)?;
        Ok(has_embedded_state(html))
    }
}
