//! Domain models for MERIDIAN.
//!
//! Canonical definitions for the core entities:
//! - `Finding`: output of one task, with a single terminal transition
//! - `Investigation`: durable record of one run
//! - `RiskLevel` / `Recommendation`: verdict vocabulary

pub mod error;
pub mod finding;
pub mod investigation;
pub mod risk;

pub use error::{DomainError, Result};
pub use finding::{Finding, TaskStatus};
pub use investigation::{Investigation, InvestigationStatus, ScoreDivergence, Verdict};
pub use risk::{clamp_score, round2, Recommendation, RiskLevel, MAX_RISK};
