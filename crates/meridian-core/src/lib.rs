//! MERIDIAN core library
//!
//! Investigation orchestration for corporate due diligence: discovery,
//! specialist fan-out, weighted synthesis, and the event stream that reports
//! progress to callers.

pub mod config;
pub mod domain;
pub mod investigations;
pub mod metrics;
pub mod obs;
pub mod orchestration;
pub mod reasoning;
pub mod tasks;
pub mod telemetry;

pub use config::{
    Collections, ConfigError, MeridianConfig, ReasoningConfig, RetryPolicy, RiskWeights,
    ScheduleConfig,
};

pub use domain::{
    DomainError, Finding, Investigation, InvestigationStatus, Recommendation, RiskLevel,
    ScoreDivergence, TaskStatus, Verdict,
};

pub use investigations::{get_investigation, list_investigations, search_entities, LookupError};

pub use orchestration::{
    validate_schedule, AgentSummary, InvestigationEvent, InvestigationStream, OrchestrationPhase,
    Orchestrator, OrchestratorError, PhaseError,
};

pub use reasoning::{GeminiClient, ReasoningEngine, ReasoningError};

pub use tasks::{
    names, weighted_score, Task, TaskContext, TaskEnv, TaskError, TaskRegistry,
};

pub use metrics::METRICS;
pub use obs::InvestigationSpan;
pub use telemetry::init_tracing;

/// MERIDIAN version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
