//! Legal intelligence: court cases, regulatory actions, and sanctions.

use async_trait::async_trait;
use meridian_state::{SearchQuery, SortOrder};
use serde_json::{json, Value};
use tracing::instrument;

use super::{field, flag, names, prompts, queries, str_field, Task, TaskContext, TaskEnv, TaskError};
use crate::domain::Finding;

const LATEST_CASES: usize = 20;
const NOTABLE_CASES: usize = 10;

pub struct LegalIntelligenceTask {
    env: TaskEnv,
}

impl LegalIntelligenceTask {
    pub fn new(env: TaskEnv) -> Self {
        Self { env }
    }

    async fn gather(&self, target: &str) -> Result<Value, TaskError> {
        let collection = &self.env.collections.legal_cases;
        let exposure = self
            .env
            .aggregate(&queries::legal_exposure(collection, target))
            .await?;
        let cases = self
            .env
            .search(
                collection,
                &SearchQuery::any_of()
                    .with_match("entity_names", target)
                    .with_match("case_name", target)
                    .sorted_by("filed_date", SortOrder::Desc)
                    .limit(LATEST_CASES),
            )
            .await?;

        let count_type = |kind: &str| cases.iter().filter(|c| str_field(c, "case_type") == kind).count();
        let sanctions = cases.iter().filter(|c| flag(c, "is_sanction")).count();
        let notable: Vec<Value> = cases
            .iter()
            .take(NOTABLE_CASES)
            .map(|c| {
                json!({
                    "name": field(c, "case_name"),
                    "type": field(c, "case_type"),
                    "filed": field(c, "filed_date"),
                    "status": field(c, "status"),
                    "outcome": field(c, "outcome"),
                    "penalty": field(c, "penalty_amount"),
                    "settlement": field(c, "settlement_amount"),
                    "allegations": c.get("allegations").cloned().unwrap_or_else(|| json!([])),
                    "regulator": field(c, "regulator"),
                    "is_sanction": field(c, "is_sanction"),
                    "sanction_list": field(c, "sanction_list"),
                })
            })
            .collect();

        Ok(json!({
            "company": target,
            "total_cases": cases.len(),
            "sanctions": sanctions,
            "criminal_cases": count_type("criminal"),
            "regulatory_actions": count_type("regulatory"),
            "aggregated_exposure": exposure,
            "notable_cases": notable,
        }))
    }
}

#[async_trait]
impl Task for LegalIntelligenceTask {
    fn name(&self) -> &str {
        names::LEGAL_INTELLIGENCE
    }

    #[instrument(skip(self, _context), fields(task = names::LEGAL_INTELLIGENCE))]
    async fn execute(&self, target: &str, _context: &TaskContext) -> Finding {
        let gathered = self.gather(target).await;
        self.env
            .assess(
                names::LEGAL_INTELLIGENCE,
                &prompts::legal_intelligence(),
                "Analyze legal exposure",
                target,
                gathered,
            )
            .await
    }
}
