//! Entity discovery: resolve the target to a canonical entity and map its
//! corporate structure.

use std::collections::BTreeSet;

use async_trait::async_trait;
use meridian_state::SearchQuery;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::jurisdictions::is_high_risk;
use super::{conclude, field, names, prompts, str_field, Assessment, Task, TaskContext, TaskEnv, TaskError};
use crate::domain::Finding;

const CANDIDATES: usize = 5;
const MAX_SUBSIDIARIES: usize = 50;
const SUBSIDIARY_SAMPLE: usize = 10;

/// Risk assigned when no corporate record matches the target.
pub const NO_MATCH_RISK: f64 = 2.0;
pub const NO_MATCH_FLAG: &str = "No corporate records found";

pub struct DiscoveryTask {
    env: TaskEnv,
}

/// Canonical entity id recorded by discovery, or `""`.
pub fn resolved_entity_id(finding: &Finding) -> String {
    finding
        .raw_context()
        .pointer("/primary_entity/entity_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl DiscoveryTask {
    pub fn new(env: TaskEnv) -> Self {
        Self { env }
    }

    /// Name matches rank ahead of alias matches.
    async fn find_primary(&self, target: &str) -> Result<Option<Value>, TaskError> {
        let entities = &self.env.collections.entities;
        let by_name = self
            .env
            .search(
                entities,
                &SearchQuery::any_of().with_match("name", target).limit(CANDIDATES),
            )
            .await?;
        if let Some(primary) = by_name.into_iter().next() {
            return Ok(Some(primary));
        }
        let by_alias = self
            .env
            .search(
                entities,
                &SearchQuery::any_of()
                    .with_match("aliases", target)
                    .limit(CANDIDATES),
            )
            .await?;
        Ok(by_alias.into_iter().next())
    }

    async fn gather(&self, primary: &Value) -> Result<Value, TaskError> {
        let entity_id = str_field(primary, "entity_id");
        let subsidiaries = if entity_id.is_empty() {
            Vec::new()
        } else {
            self.env
                .search(
                    &self.env.collections.entities,
                    &SearchQuery::all_of()
                        .with_term("parent_entity_id", entity_id)
                        .limit(MAX_SUBSIDIARIES),
                )
                .await?
        };

        let jurisdictions: BTreeSet<&str> = std::iter::once(primary)
            .chain(subsidiaries.iter())
            .map(|e| str_field(e, "jurisdiction"))
            .filter(|j| !j.is_empty())
            .collect();
        let high_risk: Vec<&str> = jurisdictions
            .iter()
            .copied()
            .filter(|j| is_high_risk(j))
            .collect();

        debug!(entity_id, subsidiaries = subsidiaries.len(), "corporate structure loaded");

        Ok(json!({
            "primary_entity": {
                "entity_id": entity_id,
                "name": field(primary, "name"),
                "jurisdiction": field(primary, "jurisdiction"),
                "incorporation_date": field(primary, "incorporation_date"),
                "status": field(primary, "status"),
                "entity_type": field(primary, "entity_type"),
            },
            "total_subsidiaries": subsidiaries.len(),
            "all_jurisdictions": jurisdictions,
            "high_risk_jurisdictions": high_risk,
            "subsidiary_sample": subsidiaries
                .iter()
                .take(SUBSIDIARY_SAMPLE)
                .map(|s| json!({
                    "name": field(s, "name"),
                    "jurisdiction": field(s, "jurisdiction"),
                    "status": field(s, "status"),
                }))
                .collect::<Vec<_>>(),
        }))
    }
}

#[async_trait]
impl Task for DiscoveryTask {
    fn name(&self) -> &str {
        names::ENTITY_DISCOVERY
    }

    #[instrument(skip(self, _context), fields(task = names::ENTITY_DISCOVERY))]
    async fn execute(&self, target: &str, _context: &TaskContext) -> Finding {
        let primary = match self.find_primary(target).await {
            Ok(Some(primary)) => primary,
            Ok(None) => {
                return conclude(
                    names::ENTITY_DISCOVERY,
                    json!({ "primary_entity": Value::Null, "matches": 0 }),
                    Ok(Assessment {
                        findings: format!(
                            "No corporate registration records found for '{target}' in our database."
                        ),
                        risk_score: NO_MATCH_RISK,
                        red_flags: vec![NO_MATCH_FLAG.to_string()],
                    }),
                );
            }
            Err(err) => return conclude(names::ENTITY_DISCOVERY, Value::Null, Err(err)),
        };

        let gathered = self.gather(&primary).await;
        self.env
            .assess(
                names::ENTITY_DISCOVERY,
                &prompts::entity_discovery(),
                "Analyze this corporate structure",
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

    fn env(store: MemoryDataStore, reasoner: ScriptedReasoner) -> TaskEnv {
        TaskEnv::new(Arc::new(store), Arc::new(reasoner), &MeridianConfig::default())
    }

    fn acme_store() -> MemoryDataStore {
        MemoryDataStore::new().with_documents(
            "entities",
            "entity_id",
            vec![
                json!({"entity_id": "E-1", "name": "Acme Holdings", "aliases": ["Acme Corp"], "jurisdiction": "Delaware"}),
                json!({"entity_id": "E-2", "name": "Acme BVI Ltd", "parent_entity_id": "E-1", "jurisdiction": "BVI"}),
                json!({"entity_id": "E-3", "name": "Acme Cayman", "parent_entity_id": "E-1", "jurisdiction": "Cayman Islands"}),
            ],
        )
    }

    #[tokio::test]
    async fn no_match_is_complete_low_risk() {
        let task = DiscoveryTask::new(env(MemoryDataStore::new(), ScriptedReasoner::new()));
        let finding = task.execute("Acme Corp", &TaskContext::default()).await;

        assert_eq!(finding.status(), TaskStatus::Complete);
        assert_eq!(finding.risk_contribution(), 2.0);
        assert_eq!(finding.red_flags(), ["No corporate records found"]);
        assert_eq!(
            finding.narrative(),
            "No corporate registration records found for 'Acme Corp' in our database."
        );
        assert_eq!(resolved_entity_id(&finding), "");
    }

    #[tokio::test]
    async fn match_maps_structure_and_asks() {
        let reasoner = ScriptedReasoner::new().respond_json(
            names::ENTITY_DISCOVERY,
            json!({"findings": "Layered offshore structure", "risk_score": 6.0, "red_flags": ["BVI subsidiary"]}),
        );
        let task = DiscoveryTask::new(env(acme_store(), reasoner));
        let finding = task.execute("Acme Holdings", &TaskContext::default()).await;

        assert_eq!(finding.status(), TaskStatus::Complete);
        assert_eq!(finding.risk_contribution(), 6.0);
        assert_eq!(resolved_entity_id(&finding), "E-1");
        let raw = finding.raw_context();
        assert_eq!(raw["total_subsidiaries"], 2);
        assert_eq!(raw["high_risk_jurisdictions"], json!(["BVI", "Cayman Islands"]));
    }

    #[tokio::test]
    async fn alias_match_resolves_entity() {
        let reasoner = ScriptedReasoner::new().respond_json(
            names::ENTITY_DISCOVERY,
            json!({"findings": "ok", "risk_score": 1.0, "red_flags": []}),
        );
        let task = DiscoveryTask::new(env(acme_store(), reasoner));
        let finding = task.execute("acme corp", &TaskContext::default()).await;
        assert_eq!(resolved_entity_id(&finding), "E-1");
    }

    #[tokio::test(start_paused = true)]
    async fn reasoning_failure_keeps_entity_id() {
        let reasoner = ScriptedReasoner::new().always_rate_limit(names::ENTITY_DISCOVERY);
        let task = DiscoveryTask::new(env(acme_store(), reasoner));
        let finding = task.execute("Acme Holdings", &TaskContext::default()).await;

        assert_eq!(finding.status(), TaskStatus::Error);
        assert!(finding.narrative().starts_with("Agent error: reasoning engine unavailable"));
        assert_eq!(resolved_entity_id(&finding), "E-1");
    }

    #[tokio::test]
    async fn store_outage_is_an_error_finding() {
        let store = MemoryDataStore::new();
        store.set_unavailable(true);
        let task = DiscoveryTask::new(env(store, ScriptedReasoner::new()));
        let finding = task.execute("Acme", &TaskContext::default()).await;

        assert_eq!(finding.status(), TaskStatus::Error);
        assert!(finding.narrative().contains("data store unavailable"));
    }
}
