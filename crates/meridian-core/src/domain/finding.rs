//! The uniform result every investigation task produces.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{DomainError, Result};
use super::risk::clamp_score;

/// Lifecycle status of a [`Finding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Complete,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one task.
///
/// Status moves `running -> complete` or `running -> error`, exactly once.
/// `completed_at` is set iff the status is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    task_name: String,
    status: TaskStatus,
    narrative: String,
    risk_contribution: f64,
    red_flags: Vec<String>,
    #[serde(default)]
    raw_context: Value,
    completed_at: Option<DateTime<Utc>>,
}

impl Finding {
    /// A fresh finding in the `running` state.
    pub fn running(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            status: TaskStatus::Running,
            narrative: String::new(),
            risk_contribution: 0.0,
            red_flags: Vec::new(),
            raw_context: Value::Null,
            completed_at: None,
        }
    }

    /// Transition to `complete`. The score is clamped into `[0, 10]`.
    pub fn complete(
        &mut self,
        narrative: impl Into<String>,
        risk_score: f64,
        red_flags: Vec<String>,
    ) -> Result<()> {
        self.ensure_running()?;
        self.narrative = narrative.into();
        self.risk_contribution = clamp_score(risk_score);
        self.red_flags = red_flags;
        self.status = TaskStatus::Complete;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Transition to `error` with narrative `Agent error: <cause>`.
    pub fn fail(&mut self, cause: impl fmt::Display) -> Result<()> {
        self.ensure_running()?;
        self.narrative = format!("Agent error: {cause}");
        self.status = TaskStatus::Error;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Attach the data the task gathered. Allowed in any state.
    pub fn set_raw_context(&mut self, raw_context: Value) {
        self.raw_context = raw_context;
    }

    fn ensure_running(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(DomainError::FindingAlreadyTerminal {
                task: self.task_name.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    pub fn risk_contribution(&self) -> f64 {
        self.risk_contribution
    }

    pub fn red_flags(&self) -> &[String] {
        &self.red_flags
    }

    pub fn raw_context(&self) -> &Value {
        &self.raw_context
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}
