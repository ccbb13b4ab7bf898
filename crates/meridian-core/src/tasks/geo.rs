//! Geo and jurisdiction: where the target and its subsidiaries are registered.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::instrument;

use super::jurisdictions::{high_risk_reason, is_sanctioned};
use super::{names, prompts, queries, str_field, Task, TaskContext, TaskEnv, TaskError};
use crate::domain::Finding;

pub struct GeoJurisdictionTask {
    env: TaskEnv,
}

impl GeoJurisdictionTask {
    pub fn new(env: TaskEnv) -> Self {
        Self { env }
    }

    async fn gather(&self, target: &str, entity_id: &str) -> Result<Value, TaskError> {
        let rows = self
            .env
            .aggregate(&queries::geo_risk(&self.env.collections.entities, entity_id))
            .await?;

        let mut high_risk: BTreeMap<&str, &str> = BTreeMap::new();
        let mut sanctioned: Vec<&str> = Vec::new();
        let mut offshore_entities = 0u64;
        for row in &rows {
            let jurisdiction = str_field(row, "jurisdiction");
            if let Some(reason) = high_risk_reason(jurisdiction) {
                high_risk.insert(jurisdiction, reason);
                offshore_entities += row.get("entity_count").and_then(Value::as_u64).unwrap_or(0);
            }
            let country = str_field(row, "country_code");
            if is_sanctioned(country) && !sanctioned.contains(&country) {
                sanctioned.push(country);
            }
            if is_sanctioned(jurisdiction) && !sanctioned.contains(&jurisdiction) {
                sanctioned.push(jurisdiction);
            }
        }

        Ok(json!({
            "company": target,
            "entity_id": entity_id,
            "jurisdiction_breakdown": rows,
            "high_risk_jurisdictions_found": high_risk,
            "sanctioned_countries_found": sanctioned,
            "offshore_entity_count": offshore_entities,
        }))
    }
}

#[async_trait]
impl Task for GeoJurisdictionTask {
    fn name(&self) -> &str {
        names::GEO_JURISDICTION
    }

    #[instrument(skip(self, context), fields(task = names::GEO_JURISDICTION, entity_id = %context.entity_id))]
    async fn execute(&self, target: &str, context: &TaskContext) -> Finding {
        let gathered = self.gather(target, &context.entity_id).await;
        self.env
            .assess(
                names::GEO_JURISDICTION,
                &prompts::geo_jurisdiction(),
                "Analyze geo/jurisdictional risk",
                target,
                gathered,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeridianConfig;
    use crate::domain::TaskStatus;
    use crate::reasoning::fakes::ScriptedReasoner;
    use meridian_state::fakes::MemoryDataStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn sums_offshore_exposure() {
        let store = MemoryDataStore::new().with_aggregate(
            queries::GEO_RISK,
            vec![
                json!({"country_code": "VG", "jurisdiction": "BVI", "entity_count": 3}),
                json!({"country_code": "KY", "jurisdiction": "Cayman Islands", "entity_count": 2}),
                json!({"country_code": "US", "jurisdiction": "Delaware", "entity_count": 4}),
                json!({"country_code": "Russia", "jurisdiction": "Moscow", "entity_count": 1}),
            ],
        );
        let reasoner = ScriptedReasoner::new().respond_json(
            names::GEO_JURISDICTION,
            json!({"findings": "Offshore heavy", "risk_score": 7.0, "red_flags": ["BVI layering"]}),
        );
        let env = TaskEnv::new(Arc::new(store), Arc::new(reasoner), &MeridianConfig::default());

        let finding = GeoJurisdictionTask::new(env)
            .execute("Acme Corp", &TaskContext::for_entity("E-1"))
            .await;

        assert_eq!(finding.status(), TaskStatus::Complete);
        let raw = finding.raw_context();
        assert_eq!(raw["entity_id"], "E-1");
        assert_eq!(raw["offshore_entity_count"], 5);
        assert_eq!(
            raw["high_risk_jurisdictions_found"]["BVI"],
            "British Virgin Islands, major offshore secrecy jurisdiction"
        );
        assert_eq!(raw["sanctioned_countries_found"], json!(["Russia"]));
    }
}
