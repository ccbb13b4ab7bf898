//! Progress events streamed to the caller while an investigation runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Finding, Investigation, Recommendation, RiskLevel, ScoreDivergence, TaskStatus,
};

/// Condensed view of one finding for the completion event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent: String,
    pub status: TaskStatus,
    pub risk_score: f64,
    pub red_flags: Vec<String>,
    pub findings: String,
}

impl From<&Finding> for AgentSummary {
    fn from(finding: &Finding) -> Self {
        Self {
            agent: finding.task_name().to_string(),
            status: finding.status(),
            risk_score: finding.risk_contribution(),
            red_flags: finding.red_flags().to_vec(),
            findings: finding.narrative().to_string(),
        }
    }
}

/// One event on the investigation stream, tagged by `event` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InvestigationEvent {
    InvestigationStarted {
        investigation_id: String,
        target: String,
        timestamp: DateTime<Utc>,
    },
    AgentStarted {
        agent: String,
    },
    AgentComplete(AgentSummary),
    InvestigationComplete {
        investigation_id: String,
        target: String,
        overall_risk_score: f64,
        risk_level: RiskLevel,
        weighted_score: f64,
        executive_summary: String,
        top_red_flags: Vec<String>,
        cross_agent_patterns: Vec<String>,
        recommended_actions: Vec<String>,
        proceed_recommendation: Recommendation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score_divergence: Option<ScoreDivergence>,
        agent_findings: Vec<AgentSummary>,
        timestamp: DateTime<Utc>,
    },
    /// Always the last event.
    StreamEnd,
}

impl InvestigationEvent {
    pub fn started(record: &Investigation) -> Self {
        Self::InvestigationStarted {
            investigation_id: record.investigation_id.clone(),
            target: record.target_name.clone(),
            timestamp: record.started_at,
        }
    }

    pub fn agent_started(agent: &str) -> Self {
        Self::AgentStarted {
            agent: agent.to_string(),
        }
    }

    pub fn agent_complete(finding: &Finding) -> Self {
        Self::AgentComplete(finding.into())
    }

    /// Completion event for a finalized record. Synthesis is listed last.
    pub fn completed(record: &Investigation) -> Self {
        let overall_risk_score = record.overall_risk_score.unwrap_or_default();
        let agent_findings = record
            .findings
            .iter()
            .chain(record.synthesis.iter())
            .map(AgentSummary::from)
            .collect();
        Self::InvestigationComplete {
            investigation_id: record.investigation_id.clone(),
            target: record.target_name.clone(),
            overall_risk_score,
            risk_level: record
                .risk_level
                .unwrap_or_else(|| RiskLevel::from_score(overall_risk_score)),
            weighted_score: record.weighted_score.unwrap_or_default(),
            executive_summary: record.executive_summary.clone(),
            top_red_flags: record.top_red_flags.clone(),
            cross_agent_patterns: record.cross_agent_patterns.clone(),
            recommended_actions: record.recommended_actions.clone(),
            proceed_recommendation: record.proceed_recommendation.unwrap_or_default(),
            score_divergence: record.score_divergence,
            agent_findings,
            timestamp: record.completed_at.unwrap_or_else(Utc::now),
        }
    }

    /// The `event` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvestigationStarted { .. } => "investigation_started",
            Self::AgentStarted { .. } => "agent_started",
            Self::AgentComplete(_) => "agent_complete",
            Self::InvestigationComplete { .. } => "investigation_complete",
            Self::StreamEnd => "stream_end",
        }
    }

    /// Server-sent-events frame: `data: <json>\n\n`.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
