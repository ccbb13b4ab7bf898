//! Bounded retry loop for rate-limited reasoning calls.

use tracing::{debug, warn};

use super::{ReasoningEngine, ReasoningError};
use crate::config::RetryPolicy;
use crate::metrics::METRICS;
use crate::obs;
use crate::tasks::TaskError;

/// Ask `engine`, retrying rate-limited attempts.
///
/// Each rate-limited attempt `n` is followed by a sleep of
/// `policy.delay_for(n)`. After `policy.max_attempts` rate-limited attempts
/// the call fails with [`TaskError::ReasoningUnavailable`]. Any other error
/// fails immediately with the same variant.
pub async fn ask_with_retry(
    engine: &dyn ReasoningEngine,
    policy: &RetryPolicy,
    task_name: &str,
    system_prompt: &str,
    user_message: &str,
) -> Result<String, TaskError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = ReasoningError::EmptyResponse;

    for attempt in 1..=max_attempts {
        match engine.ask(system_prompt, user_message).await {
            Ok(text) => {
                debug!(task = %task_name, attempt, "reasoning call succeeded");
                return Ok(text);
            }
            Err(err) if err.is_rate_limited() => {
                let delay = policy.delay_for(attempt);
                obs::emit_rate_limited(task_name, attempt, max_attempts, delay);
                METRICS.inc_rate_limit_retries();
                tokio::time::sleep(delay).await;
                last_error = err;
            }
            Err(err) => {
                warn!(task = %task_name, attempt, error = %err, "reasoning call failed");
                return Err(TaskError::ReasoningUnavailable {
                    attempts: attempt,
                    source: err,
                });
            }
        }
    }

    Err(TaskError::ReasoningUnavailable {
        attempts: max_attempts,
        source: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::fakes::ScriptedReasoner;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            backoff_base: Duration::from_secs(15),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_rate_limits() {
        let engine = ScriptedReasoner::new()
            .rate_limit_times("Financial Signal", 2)
            .respond("Financial Signal", r#"{"ok": true}"#);
        let start = tokio::time::Instant::now();

        let text = ask_with_retry(&engine, &policy(), "Financial Signal", "Financial Signal", "go")
            .await
            .unwrap();

        assert_eq!(text, r#"{"ok": true}"#);
        assert_eq!(engine.calls_for("Financial Signal"), 3);
        // 15s + 30s of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let engine = ScriptedReasoner::new().always_rate_limit("Legal Intelligence");
        let start = tokio::time::Instant::now();

        let err = ask_with_retry(&engine, &policy(), "Legal Intelligence", "Legal Intelligence", "go")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TaskError::ReasoningUnavailable { attempts: 4, .. }
        ));
        assert_eq!(engine.calls_for("Legal Intelligence"), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(15 + 30 + 45 + 60));
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let engine = ScriptedReasoner::new().fail("Geo & Jurisdiction", "connection reset");

        let err = ask_with_retry(&engine, &policy(), "Geo & Jurisdiction", "Geo & Jurisdiction", "go")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TaskError::ReasoningUnavailable { attempts: 1, .. }
        ));
        assert_eq!(engine.calls_for("Geo & Jurisdiction"), 1);
    }
}
