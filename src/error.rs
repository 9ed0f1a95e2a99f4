//! Run-level error types for the collection pipeline
//!
//! Field-extraction and value-parse failures are not errors; they resolve to
//! defaults and are tracked as diagnostic counters. These variants cover the
//! failures that can abort a request or a region run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("authorization failed for {url}")]
    AuthFailed { url: String },

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response shape from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl CollectorError {
    /// Auth failures get one credential refresh + retry; everything else does not.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailed { .. })
    }

    pub fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

pub type CollectorResult<T> = Result<T, CollectorError>;
