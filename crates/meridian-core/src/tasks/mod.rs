//! Investigation tasks.
//!
//! Every task gathers data from the [`DataStore`], asks the reasoning engine
//! for an assessment, and returns a terminal [`Finding`]. `execute` never
//! fails outward; errors become `error` findings.

mod discovery;
mod error;
mod executive;
mod financial;
mod geo;
pub mod jurisdictions;
mod legal;
mod prompts;
pub mod queries;
mod sentiment;
mod synthesis;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use meridian_state::{AggregateQuery, DataStore, Document, SearchQuery};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::config::{Collections, MeridianConfig, RetryPolicy};
use crate::domain::Finding;
use crate::reasoning::{ask_with_retry, parse_structured, ReasoningEngine};

pub use discovery::{resolved_entity_id, DiscoveryTask};
pub use error::TaskError;
pub use executive::ExecutiveBackgroundTask;
pub use financial::FinancialSignalTask;
pub use geo::GeoJurisdictionTask;
pub use legal::LegalIntelligenceTask;
pub use sentiment::SentimentTask;
pub use synthesis::{weighted_score, Synthesis, SynthesisTask};

/// Canonical task names.
pub mod names {
    pub const ENTITY_DISCOVERY: &str = "Entity Discovery";
    pub const FINANCIAL_SIGNAL: &str = "Financial Signal";
    pub const LEGAL_INTELLIGENCE: &str = "Legal Intelligence";
    pub const EXECUTIVE_BACKGROUND: &str = "Executive Background";
    pub const SENTIMENT_NARRATIVE: &str = "Sentiment & Narrative";
    pub const GEO_JURISDICTION: &str = "Geo & Jurisdiction";
    pub const RISK_SYNTHESIS: &str = "Risk Synthesis";
}

/// Read-only context shared with tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    /// Canonical id of the target; empty when discovery found no match.
    pub entity_id: String,
    /// Findings handed to synthesis.
    pub findings: Vec<Finding>,
}

impl TaskContext {
    pub fn for_entity(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            findings: Vec::new(),
        }
    }
}

/// A unit of investigation work.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    /// Always returns a terminal finding.
    async fn execute(&self, target: &str, context: &TaskContext) -> Finding;
}

/// Reply shape every discovery/specialist prompt asks for.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Assessment {
    pub findings: String,
    pub risk_score: f64,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

/// Dependencies shared by all tasks.
#[derive(Clone)]
pub struct TaskEnv {
    pub store: Arc<dyn DataStore>,
    pub reasoner: Arc<dyn ReasoningEngine>,
    pub retry: RetryPolicy,
    pub collections: Collections,
}

impl TaskEnv {
    pub fn new(
        store: Arc<dyn DataStore>,
        reasoner: Arc<dyn ReasoningEngine>,
        config: &MeridianConfig,
    ) -> Self {
        Self {
            store,
            reasoner,
            retry: config.retry,
            collections: config.collections.clone(),
        }
    }

    pub(crate) async fn search(
        &self,
        collection: &str,
        query: &SearchQuery,
    ) -> Result<Vec<Document>, TaskError> {
        Ok(self.store.search(collection, query).await?)
    }

    pub(crate) async fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<Document>, TaskError> {
        Ok(self.store.aggregate(query).await?)
    }

    pub(crate) async fn ask(
        &self,
        task_name: &str,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, TaskError> {
        ask_with_retry(
            self.reasoner.as_ref(),
            &self.retry,
            task_name,
            system_prompt,
            user_message,
        )
        .await
    }

    /// Ask for an [`Assessment`] of `gathered` and close the finding.
    ///
    /// `gathered` is kept as the finding's raw context whatever the outcome.
    pub(crate) async fn assess(
        &self,
        task_name: &str,
        system_prompt: &str,
        instruction: &str,
        target: &str,
        gathered: Result<Value, TaskError>,
    ) -> Finding {
        let gathered = match gathered {
            Ok(value) => value,
            Err(err) => return conclude(task_name, Value::Null, Err(err)),
        };
        let message = render_message(instruction, target, &gathered);
        let outcome = match self.ask(task_name, system_prompt, &message).await {
            Ok(text) => parse_structured::<Assessment>(&text),
            Err(err) => Err(err),
        };
        conclude(task_name, gathered, outcome)
    }
}

/// `"<instruction> for '<target>':"` followed by pretty-printed data.
pub(crate) fn render_message(instruction: &str, target: &str, data: &Value) -> String {
    let body = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    format!("{instruction} for '{target}':\n\n{body}")
}

/// Build the terminal finding for a task outcome.
pub(crate) fn conclude(
    task_name: &str,
    raw_context: Value,
    outcome: Result<Assessment, TaskError>,
) -> Finding {
    let mut finding = Finding::running(task_name);
    finding.set_raw_context(raw_context);
    let transition = match outcome {
        Ok(a) => finding.complete(a.findings, a.risk_score, a.red_flags),
        Err(err) => {
            warn!(task = %task_name, error = %err, "task failed");
            finding.fail(&err)
        }
    };
    if let Err(err) = transition {
        warn!(task = %task_name, error = %err, "finding transition rejected");
    }
    finding
}

/// Registry of specialist tasks, looked up by name.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five built-in specialists.
    pub fn standard(env: &TaskEnv) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FinancialSignalTask::new(env.clone())));
        registry.register(Arc::new(LegalIntelligenceTask::new(env.clone())));
        registry.register(Arc::new(ExecutiveBackgroundTask::new(env.clone())));
        registry.register(Arc::new(SentimentTask::new(env.clone())));
        registry.register(Arc::new(GeoJurisdictionTask::new(env.clone())));
        registry
    }

    /// Add or replace a task under its own name.
    pub fn register(&mut self, task: Arc<dyn Task>) {
        self.tasks.insert(task.name().to_string(), task);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }
}

/// First string value at `field`, or `""`.
pub(crate) fn str_field<'a>(doc: &'a Value, field: &str) -> &'a str {
    doc.get(field).and_then(Value::as_str).unwrap_or("")
}

/// Whether `field` is JSON `true`.
pub(crate) fn flag(doc: &Value, field: &str) -> bool {
    doc.get(field).and_then(Value::as_bool).unwrap_or(false)
}

/// Field value or `null`.
pub(crate) fn field(doc: &Value, field: &str) -> Value {
    doc.get(field).cloned().unwrap_or(Value::Null)
}
