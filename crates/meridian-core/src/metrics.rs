//! Global atomic counters for the engine.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of an investigation).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters: no allocations, no locking.
pub struct Metrics {
    investigations_started: AtomicU64,
    task_errors: AtomicU64,
    rate_limit_retries: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            investigations_started: AtomicU64::new(0),
            task_errors: AtomicU64::new(0),
            rate_limit_retries: AtomicU64::new(0),
        }
    }

    pub fn inc_investigations_started(&self) {
        self.investigations_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "investigations_started", "counter incremented");
    }

    /// Count a task that ended in `error`.
    pub fn inc_task_errors(&self) {
        self.task_errors.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "task_errors", "counter incremented");
    }

    /// Count one rate-limited reasoning attempt.
    pub fn inc_rate_limit_retries(&self) {
        self.rate_limit_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rate_limit_retries", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            investigations_started = self.investigations_started(),
            task_errors = self.task_errors(),
            rate_limit_retries = self.rate_limit_retries(),
        );
    }

    pub fn investigations_started(&self) -> u64 {
        self.investigations_started.load(Ordering::Relaxed)
    }

    pub fn task_errors(&self) -> u64 {
        self.task_errors.load(Ordering::Relaxed)
    }

    pub fn rate_limit_retries(&self) -> u64 {
        self.rate_limit_retries.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.investigations_started.store(0, Ordering::Relaxed);
        self.task_errors.store(0, Ordering::Relaxed);
        self.rate_limit_retries.store(0, Ordering::Relaxed);
    }
}
