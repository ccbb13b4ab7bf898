//! Observability tests for the investigation lifecycle.
//!
//! Emission functions must be safe to call with or without an active
//! subscriber and inside or outside an investigation span.

use std::time::Duration;

use meridian_core::obs::{
    emit_band_mismatch, emit_investigation_finished, emit_investigation_started,
    emit_persist_error, emit_rate_limited, emit_score_divergence, emit_task_finished,
};
use meridian_core::{InvestigationSpan, RiskLevel, TaskStatus, METRICS};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn lifecycle_events_emit_inside_span() {
    let span = InvestigationSpan::enter("inv-obs-1");
    emit_investigation_started("inv-obs-1", "Acme Corp");
    emit_task_finished("inv-obs-1", "Financial Signal", TaskStatus::Complete, 3.5);
    emit_task_finished("inv-obs-1", "Legal Intelligence", TaskStatus::Error, 0.0);
    emit_investigation_finished("inv-obs-1", 1200, 4.1, RiskLevel::Medium, 1);
    drop(span);
}

#[traced_test]
#[test]
fn warnings_emit_without_span() {
    emit_rate_limited("Geo & Jurisdiction", 4, 4, Duration::from_secs(60));
    emit_persist_error("inv-obs-2", &"connection reset");
    emit_band_mismatch("inv-obs-2", RiskLevel::Low, RiskLevel::Medium);
    emit_score_divergence(8.0, 2.1, 5.9);
}

#[test]
fn metrics_flush_without_subscriber() {
    METRICS.inc_investigations_started();
    METRICS.flush();
    assert!(METRICS.investigations_started() >= 1);
}
