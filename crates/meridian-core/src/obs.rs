//! Structured observability hooks for the investigation lifecycle.
//!
//! This module provides:
//! - Investigation-scoped tracing spans via the `InvestigationSpan` RAII guard
//! - Emission functions for lifecycle events: start, task finished, retry, finish
//!
//! Events are emitted at `info!` level unless they signal trouble. Verbosity
//! follows `RUST_LOG`; pass `--json` to the CLI for JSON lines.

use std::time::Duration;

use tracing::{info, warn};

use crate::domain::{RiskLevel, TaskStatus};

/// RAII guard that enters an investigation-scoped span.
///
/// # Example
///
/// ```ignore
/// let _span = InvestigationSpan::enter("inv-12345");
/// // every event below now carries investigation_id = "inv-12345"
/// ```
pub struct InvestigationSpan {
    _span: tracing::span::EnteredSpan,
}

impl InvestigationSpan {
    pub fn enter(investigation_id: &str) -> Self {
        Self {
            _span: span(investigation_id).entered(),
        }
    }
}

/// Span for an investigation, for use with `Instrument` on spawned futures.
pub fn span(investigation_id: &str) -> tracing::Span {
    tracing::info_span!("meridian.investigation", investigation_id = %investigation_id)
}

/// Emit event: investigation started.
///
/// ```ignore
/// emit_investigation_started("inv-1", "Acme Corp");
/// // logs: event=investigation.started investigation_id=inv-1 target=Acme Corp
/// ```
pub fn emit_investigation_started(investigation_id: &str, target: &str) {
    info!(event = "investigation.started", investigation_id = %investigation_id, target = %target);
}

/// Emit event: a task reached a terminal status.
pub fn emit_task_finished(investigation_id: &str, task: &str, status: TaskStatus, risk_score: f64) {
    if status == TaskStatus::Error {
        warn!(
            event = "task.finished",
            investigation_id = %investigation_id,
            task = %task,
            status = %status,
            risk_score,
        );
    } else {
        info!(
            event = "task.finished",
            investigation_id = %investigation_id,
            task = %task,
            status = %status,
            risk_score,
        );
    }
}

/// Emit event: a reasoning call was rate limited and will back off.
pub fn emit_rate_limited(task: &str, attempt: u32, max_attempts: u32, delay: Duration) {
    warn!(
        event = "reasoning.rate_limited",
        task = %task,
        attempt,
        max_attempts,
        delay_secs = delay.as_secs_f64(),
    );
}

/// Emit event: investigation finished with its final band.
pub fn emit_investigation_finished(
    investigation_id: &str,
    duration_ms: u64,
    overall_risk_score: f64,
    risk_level: RiskLevel,
    errors: u64,
) {
    info!(
        event = "investigation.finished",
        investigation_id = %investigation_id,
        duration_ms,
        overall_risk_score,
        risk_level = %risk_level,
        task_errors = errors,
    );
}

/// Emit event: the final record could not be written (warning level).
pub fn emit_persist_error(investigation_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "investigation.persist_error", investigation_id = %investigation_id, error = %error);
}

/// Emit event: the engine's stated band disagrees with the derived one.
pub fn emit_band_mismatch(investigation_id: &str, stated: RiskLevel, derived: RiskLevel) {
    warn!(
        event = "synthesis.band_mismatch",
        investigation_id = %investigation_id,
        stated = %stated,
        derived = %derived,
    );
}

/// Emit event: engine score and weighted hint diverged past the threshold.
pub fn emit_score_divergence(engine_score: f64, weighted_score: f64, delta: f64) {
    warn!(
        event = "synthesis.score_divergence",
        engine_score,
        weighted_score,
        delta,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn span_guard_enters() {
        let _span = InvestigationSpan::enter("inv-test");
    }

    #[traced_test]
    #[test]
    fn task_errors_log_at_warn() {
        emit_task_finished("inv-1", "Legal Intelligence", TaskStatus::Error, 0.0);
        assert!(logs_contain("WARN"));
        assert!(logs_contain("task.finished"));
        assert!(logs_contain("Legal Intelligence"));
    }

    #[traced_test]
    #[test]
    fn rate_limit_carries_attempt_and_delay() {
        emit_rate_limited("Financial Signal", 2, 4, Duration::from_secs(30));
        assert!(logs_contain("reasoning.rate_limited"));
        assert!(logs_contain("attempt=2"));
        assert!(logs_contain("delay_secs=30"));
    }

    #[traced_test]
    #[test]
    fn band_mismatch_names_both_levels() {
        let _span = InvestigationSpan::enter("inv-band");
        emit_band_mismatch("inv-band", RiskLevel::High, RiskLevel::Critical);
        assert!(logs_contain("synthesis.band_mismatch"));
        assert!(logs_contain("stated=HIGH"));
        assert!(logs_contain("derived=CRITICAL"));
    }
}
