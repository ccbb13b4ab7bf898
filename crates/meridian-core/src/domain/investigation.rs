//! Durable record of one investigation run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};
use super::finding::Finding;
use super::risk::{clamp_score, Recommendation, RiskLevel};

/// Status of an investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
    Running,
    Complete,
}

/// Engine score and weighted hint disagreed by more than the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDivergence {
    pub engine_score: f64,
    pub weighted_score: f64,
    pub delta: f64,
}

/// Final assessment produced by synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
    pub weighted_score: f64,
    pub executive_summary: String,
    pub top_red_flags: Vec<String>,
    pub cross_agent_patterns: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub proceed_recommendation: Recommendation,
    pub score_divergence: Option<ScoreDivergence>,
}

/// One investigation, created `running` before any task starts and
/// finalized exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investigation {
    pub investigation_id: String,
    pub target_name: String,
    /// Empty when discovery found no match.
    #[serde(default)]
    pub target_entity_id: String,
    pub status: InvestigationStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub overall_risk_score: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    /// Discovery and specialist findings, in dispatch order.
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub synthesis: Option<Finding>,
    #[serde(default)]
    pub weighted_score: Option<f64>,
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub top_red_flags: Vec<String>,
    #[serde(default)]
    pub cross_agent_patterns: Vec<String>,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub proceed_recommendation: Option<Recommendation>,
    #[serde(default)]
    pub score_divergence: Option<ScoreDivergence>,
}

impl Investigation {
    /// Create a new running investigation.
    pub fn start(investigation_id: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            investigation_id: investigation_id.into(),
            target_name: target_name.into(),
            target_entity_id: String::new(),
            status: InvestigationStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            overall_risk_score: None,
            risk_level: None,
            findings: Vec::new(),
            synthesis: None,
            weighted_score: None,
            executive_summary: String::new(),
            top_red_flags: Vec::new(),
            cross_agent_patterns: Vec::new(),
            recommended_actions: Vec::new(),
            proceed_recommendation: None,
            score_divergence: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == InvestigationStatus::Complete
    }

    /// Apply the verdict and close the record. The band is always re-derived
    /// from the final score.
    pub fn finalize(&mut self, verdict: Verdict, synthesis: Finding) -> Result<()> {
        if self.is_complete() {
            return Err(DomainError::AlreadyFinalized(self.investigation_id.clone()));
        }
        let score = clamp_score(verdict.overall_risk_score);
        self.overall_risk_score = Some(score);
        self.risk_level = Some(RiskLevel::from_score(score));
        self.weighted_score = Some(verdict.weighted_score);
        self.executive_summary = verdict.executive_summary;
        self.top_red_flags = verdict.top_red_flags;
        self.cross_agent_patterns = verdict.cross_agent_patterns;
        self.recommended_actions = verdict.recommended_actions;
        self.proceed_recommendation = Some(verdict.proceed_recommendation);
        self.score_divergence = verdict.score_divergence;
        self.synthesis = Some(synthesis);
        self.status = InvestigationStatus::Complete;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(score: f64, level: RiskLevel) -> Verdict {
        Verdict {
            overall_risk_score: score,
            risk_level: level,
            weighted_score: 3.1,
            executive_summary: "summary".into(),
            top_red_flags: vec!["flag".into()],
            cross_agent_patterns: vec![],
            recommended_actions: vec!["act".into()],
            proceed_recommendation: Recommendation::Conditional,
            score_divergence: None,
        }
    }

    #[test]
    fn finalize_rederives_band() {
        let mut inv = Investigation::start("inv-1", "Acme Corp");
        inv.finalize(verdict(7.5, RiskLevel::High), Finding::running("Risk Synthesis"))
            .unwrap();

        assert!(inv.is_complete());
        assert_eq!(inv.risk_level, Some(RiskLevel::Critical));
        assert_eq!(inv.overall_risk_score, Some(7.5));
        assert!(inv.completed_at.is_some());
    }

    #[test]
    fn finalize_is_once_only() {
        let mut inv = Investigation::start("inv-2", "Acme Corp");
        inv.finalize(verdict(1.0, RiskLevel::Low), Finding::running("Risk Synthesis"))
            .unwrap();
        let err = inv
            .finalize(verdict(9.0, RiskLevel::Critical), Finding::running("Risk Synthesis"))
            .unwrap_err();
        assert_eq!(err, DomainError::AlreadyFinalized("inv-2".into()));
        assert_eq!(inv.overall_risk_score, Some(1.0));
    }

    #[test]
    fn running_record_deserializes_with_defaults() {
        let json = serde_json::json!({
            "investigation_id": "inv-3",
            "target_name": "Globex",
            "status": "running",
            "started_at": "2026-01-01T00:00:00Z",
        });
        let inv: Investigation = serde_json::from_value(json).unwrap();
        assert_eq!(inv.status, InvestigationStatus::Running);
        assert!(inv.findings.is_empty());
        assert!(inv.risk_level.is_none());
    }
}
