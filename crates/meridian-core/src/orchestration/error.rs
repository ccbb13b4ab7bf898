//! Error types for orchestration.

use meridian_state::StoreError;

use super::phase::OrchestrationPhase;
use crate::config::ConfigError;

/// Errors that stop an investigation before it produces any event.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("initial investigation record could not be persisted: {0}")]
    InitialPersist(#[source] StoreError),

    #[error("investigation record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("investigation '{0}' is already running")]
    AlreadyRunning(String),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Rejected phase transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    #[error("cannot move backward from {from} to {to}")]
    Backward {
        from: OrchestrationPhase,
        to: OrchestrationPhase,
    },

    #[error("cannot skip from {from} to {to}")]
    Skipped {
        from: OrchestrationPhase,
        to: OrchestrationPhase,
    },

    #[error("already in {0}")]
    Unchanged(OrchestrationPhase),
}
