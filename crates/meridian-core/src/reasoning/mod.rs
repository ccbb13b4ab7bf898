//! Reasoning engine capability.
//!
//! Tasks never call a [`ReasoningEngine`] directly; they go through
//! [`ask_with_retry`], which applies the rate-limit retry policy, and then
//! decode the reply with [`parse_structured`].

pub mod error;
pub mod fakes;
mod gemini;
mod retry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub use error::ReasoningError;
pub use gemini::GeminiClient;
pub use retry::ask_with_retry;

use crate::tasks::TaskError;

/// A remote model that answers a system prompt plus user message with text.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn ask(&self, system_prompt: &str, user_message: &str) -> Result<String, ReasoningError>;
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Decode a reasoning reply into the task's JSON shape.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, TaskError> {
    serde_json::from_str(strip_code_fences(text))
        .map_err(|e| TaskError::ReasoningMalformed(e.to_string()))
}
