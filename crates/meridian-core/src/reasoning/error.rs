//! Error types for reasoning engine calls.

use std::time::Duration;

/// Errors returned by a single reasoning call.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ReasoningError {
    #[error("rate limited by reasoning engine")]
    RateLimited { retry_after: Option<Duration> },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("reasoning API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("reasoning engine returned no text")]
    EmptyResponse,
}

impl ReasoningError {
    /// Whether the call should be retried under the rate-limit policy.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ReasoningError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for ReasoningError {
    fn from(err: reqwest::Error) -> Self {
        ReasoningError::Transport(err.to_string())
    }
}
