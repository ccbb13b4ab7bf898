//! Executive background: people linked to the target and their histories.

use async_trait::async_trait;
use meridian_state::SearchQuery;
use serde_json::{json, Value};
use tracing::instrument;

use super::{field, flag, names, prompts, Task, TaskContext, TaskEnv, TaskError};
use crate::domain::Finding;

const MAX_EXECUTIVES: usize = 20;
const PROFILE_SAMPLE: usize = 10;
const HISTORY_SAMPLE: usize = 5;
const HIGH_RISK_SCORE: f64 = 7.0;

pub struct ExecutiveBackgroundTask {
    env: TaskEnv,
}

impl ExecutiveBackgroundTask {
    pub fn new(env: TaskEnv) -> Self {
        Self { env }
    }

    async fn gather(&self, target: &str, entity_id: &str) -> Result<Value, TaskError> {
        let mut query = SearchQuery::any_of()
            .with_match("employment_history.entity_name", target)
            .limit(MAX_EXECUTIVES);
        if !entity_id.is_empty() {
            query = query.with_term("current_entity_id", entity_id);
        }
        let executives = self
            .env
            .search(&self.env.collections.executives, &query)
            .await?;

        let peps = executives.iter().filter(|e| flag(e, "is_pep")).count();
        let sanctioned = executives.iter().filter(|e| flag(e, "is_sanctioned")).count();
        let high_risk = executives
            .iter()
            .filter(|e| e.get("risk_score").and_then(Value::as_f64).unwrap_or(0.0) >= HIGH_RISK_SCORE)
            .count();

        let profiles: Vec<Value> = executives
            .iter()
            .take(PROFILE_SAMPLE)
            .map(|e| {
                let history: Vec<Value> = e
                    .get("employment_history")
                    .and_then(Value::as_array)
                    .map(|h| h.iter().take(HISTORY_SAMPLE).cloned().collect())
                    .unwrap_or_default();
                json!({
                    "name": field(e, "full_name"),
                    "title": field(e, "current_title"),
                    "is_pep": field(e, "is_pep"),
                    "is_sanctioned": field(e, "is_sanctioned"),
                    "risk_score": field(e, "risk_score"),
                    "risk_flags": e.get("risk_flags").cloned().unwrap_or_else(|| json!([])),
                    "nationalities": e.get("nationalities").cloned().unwrap_or_else(|| json!([])),
                    "employment_history": history,
                    "pep_details": field(e, "pep_details"),
                })
            })
            .collect();

        Ok(json!({
            "company": target,
            "executives_found": executives.len(),
            "pep_count": peps,
            "sanctioned_count": sanctioned,
            "high_risk_count": high_risk,
            "executive_profiles": profiles,
        }))
    }
}

#[async_trait]
impl Task for ExecutiveBackgroundTask {
    fn name(&self) -> &str {
        names::EXECUTIVE_BACKGROUND
    }

    #[instrument(skip(self, context), fields(task = names::EXECUTIVE_BACKGROUND, entity_id = %context.entity_id))]
    async fn execute(&self, target: &str, context: &TaskContext) -> Finding {
        let gathered = self.gather(target, &context.entity_id).await;
        self.env
            .assess(
                names::EXECUTIVE_BACKGROUND,
                &prompts::executive_background(),
                "Analyze executive backgrounds",
                target,
                gathered,
            )
            .await
    }
}
