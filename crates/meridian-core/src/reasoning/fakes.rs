//! Scripted reasoning engine (testing and demos).
//!
//! `ScriptedReasoner` routes each call by looking for a registered key in the
//! system prompt. Every task prompt names its task, so keys are task names.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ReasoningEngine, ReasoningError};

#[derive(Debug, Default, Clone)]
struct Script {
    response: Option<String>,
    rate_limits_remaining: u32,
    always_rate_limited: bool,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: usize,
    user_messages: Vec<String>,
}

/// Deterministic [`ReasoningEngine`] for tests.
#[derive(Debug, Default)]
pub struct ScriptedReasoner {
    scripts: Mutex<HashMap<String, Script>>,
    fallback: Option<String>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    fn edit(self, key: &str, f: impl FnOnce(&mut Script)) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            f(scripts.entry(key.to_string()).or_default());
        }
        self
    }

    /// Answer calls routed to `key` with `text`.
    pub fn respond(self, key: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        self.edit(key, |s| s.response = Some(text))
    }

    /// Answer calls routed to `key` with serialized JSON.
    pub fn respond_json(self, key: &str, value: serde_json::Value) -> Self {
        self.respond(key, value.to_string())
    }

    /// Rate-limit the first `n` calls routed to `key`.
    pub fn rate_limit_times(self, key: &str, n: u32) -> Self {
        self.edit(key, |s| s.rate_limits_remaining = n)
    }

    /// Rate-limit every call routed to `key`.
    pub fn always_rate_limit(self, key: &str) -> Self {
        self.edit(key, |s| s.always_rate_limited = true)
    }

    /// Fail every call routed to `key` with a transport error.
    pub fn fail(self, key: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        self.edit(key, |s| s.failure = Some(message))
    }

    /// Sleep before answering calls routed to `key`.
    pub fn delay(self, key: &str, delay: Duration) -> Self {
        self.edit(key, |s| s.delay = Some(delay))
    }

    /// Answer unrouted calls with `text`.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Number of calls routed to `key` so far.
    pub fn calls_for(&self, key: &str) -> usize {
        self.scripts
            .lock()
            .unwrap()
            .get(key)
            .map(|s| s.calls)
            .unwrap_or(0)
    }

    /// Total calls across all keys.
    pub fn total_calls(&self) -> usize {
        self.scripts.lock().unwrap().values().map(|s| s.calls).sum()
    }

    /// User messages received for `key`, oldest first.
    pub fn user_messages_for(&self, key: &str) -> Vec<String> {
        self.scripts
            .lock()
            .unwrap()
            .get(key)
            .map(|s| s.user_messages.clone())
            .unwrap_or_default()
    }

    /// Longest registered key contained in the prompt.
    fn route(&self, system_prompt: &str) -> Option<String> {
        self.scripts
            .lock()
            .unwrap()
            .keys()
            .filter(|k| system_prompt.contains(k.as_str()))
            .max_by_key(|k| k.len())
            .cloned()
    }
}

enum Outcome {
    Reply(String),
    Fail(ReasoningError),
}

#[async_trait]
impl ReasoningEngine for ScriptedReasoner {
    async fn ask(&self, system_prompt: &str, user_message: &str) -> Result<String, ReasoningError> {
        let Some(key) = self.route(system_prompt) else {
            return self.fallback.clone().ok_or_else(|| ReasoningError::Api {
                status: 404,
                message: "no scripted response".to_string(),
            });
        };

        let (delay, outcome) = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.entry(key).or_default();
            script.calls += 1;
            script.user_messages.push(user_message.to_string());

            let outcome = if script.always_rate_limited {
                Outcome::Fail(ReasoningError::RateLimited { retry_after: None })
            } else if script.rate_limits_remaining > 0 {
                script.rate_limits_remaining -= 1;
                Outcome::Fail(ReasoningError::RateLimited { retry_after: None })
            } else if let Some(message) = &script.failure {
                Outcome::Fail(ReasoningError::Transport(message.clone()))
            } else if let Some(response) = &script.response {
                Outcome::Reply(response.clone())
            } else if let Some(fallback) = &self.fallback {
                Outcome::Reply(fallback.clone())
            } else {
                Outcome::Fail(ReasoningError::EmptyResponse)
            };
            (script.delay, outcome)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match outcome {
            Outcome::Reply(text) => Ok(text),
            Outcome::Fail(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_on_longest_key() {
        let engine = ScriptedReasoner::new()
            .respond("Signal", "short")
            .respond("Financial Signal", "long");
        let reply = engine
            .ask("You are MERIDIAN's Financial Signal Agent.", "x")
            .await
            .unwrap();
        assert_eq!(reply, "long");
        assert_eq!(engine.calls_for("Financial Signal"), 1);
        assert_eq!(engine.calls_for("Signal"), 0);
    }

    #[tokio::test]
    async fn unrouted_without_fallback_is_an_error() {
        let engine = ScriptedReasoner::new();
        assert!(engine.ask("anything", "x").await.is_err());

        let engine = ScriptedReasoner::new().with_fallback("{}");
        assert_eq!(engine.ask("anything", "x").await.unwrap(), "{}");
    }
}
