//! Financial signal: filings, annual trend, and auditor history.

use async_trait::async_trait;
use meridian_state::{SearchQuery, SortOrder};
use serde_json::{json, Value};
use tracing::instrument;

use super::{field, flag, names, prompts, queries, str_field, Task, TaskContext, TaskEnv, TaskError};
use crate::domain::Finding;

const LATEST_FILINGS: usize = 10;
const TREND_ROWS: usize = 8;
const RECENT_SAMPLE: usize = 5;

pub struct FinancialSignalTask {
    env: TaskEnv,
}

impl FinancialSignalTask {
    pub fn new(env: TaskEnv) -> Self {
        Self { env }
    }

    async fn gather(&self, target: &str) -> Result<Value, TaskError> {
        let filings_collection = &self.env.collections.filings;
        let trend = self
            .env
            .aggregate(&queries::financial_trend(filings_collection, target))
            .await?;
        let auditors = self
            .env
            .aggregate(&queries::auditor_changes(filings_collection, target))
            .await?;
        let filings = self
            .env
            .search(
                filings_collection,
                &SearchQuery::all_of()
                    .with_match("entity_name", target)
                    .sorted_by("filing_date", SortOrder::Desc)
                    .limit(LATEST_FILINGS),
            )
            .await?;

        let going_concern = filings.iter().filter(|f| flag(f, "going_concern")).count();
        let restatements = filings.iter().filter(|f| flag(f, "restatement")).count();
        let non_clean = filings
            .iter()
            .filter(|f| !matches!(str_field(f, "auditor_opinion"), "" | "clean"))
            .count();

        let trend = if trend.is_empty() {
            json!("No financial trend data available")
        } else {
            json!(trend.iter().take(TREND_ROWS).collect::<Vec<_>>())
        };
        let auditors = if auditors.is_empty() {
            json!("No auditor history available")
        } else {
            json!(auditors)
        };

        Ok(json!({
            "company": target,
            "filings_analyzed": filings.len(),
            "going_concern_warnings": going_concern,
            "restatements": restatements,
            "non_clean_audit_opinions": non_clean,
            "financial_trend": trend,
            "auditor_history": auditors,
            "recent_filings": filings
                .iter()
                .take(RECENT_SAMPLE)
                .map(|f| json!({
                    "date": field(f, "filing_date"),
                    "type": field(f, "filing_type"),
                    "revenue": field(f, "revenue"),
                    "net_income": field(f, "net_income"),
                    "total_debt": field(f, "total_debt"),
                    "auditor": field(f, "auditor"),
                    "opinion": field(f, "auditor_opinion"),
                    "going_concern": field(f, "going_concern"),
                    "restatement": field(f, "restatement"),
                }))
                .collect::<Vec<_>>(),
        }))
    }
}

#[async_trait]
impl Task for FinancialSignalTask {
    fn name(&self) -> &str {
        names::FINANCIAL_SIGNAL
    }

    #[instrument(skip(self, _context), fields(task = names::FINANCIAL_SIGNAL))]
    async fn execute(&self, target: &str, _context: &TaskContext) -> Finding {
        let gathered = self.gather(target).await;
        self.env
            .assess(
                names::FINANCIAL_SIGNAL,
                &prompts::financial_signal(),
                "Analyze the financial data",
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
    async fn counts_warning_signs() {
        let store = MemoryDataStore::new()
            .with_documents(
                "filings",
                "filing_id",
                vec![
                    json!({"filing_id": "F-1", "entity_name": "Acme Corp", "filing_date": "2023-03-01", "going_concern": true, "auditor_opinion": "qualified"}),
                    json!({"filing_id": "F-2", "entity_name": "Acme Corp", "filing_date": "2024-03-01", "restatement": true, "auditor_opinion": "clean"}),
                    json!({"filing_id": "F-3", "entity_name": "Globex", "filing_date": "2024-03-01", "going_concern": true}),
                ],
            )
            .with_aggregate(queries::FINANCIAL_TREND, vec![json!({"filing_date": "2023-03-01", "revenue": 10})]);
        let reasoner = ScriptedReasoner::new().respond_json(
            names::FINANCIAL_SIGNAL,
            json!({"findings": "Going concern doubt", "risk_score": 7.0, "red_flags": ["Going concern"]}),
        );
        let env = TaskEnv::new(Arc::new(store), Arc::new(reasoner), &MeridianConfig::default());

        let finding = FinancialSignalTask::new(env)
            .execute("Acme Corp", &TaskContext::default())
            .await;

        assert_eq!(finding.status(), TaskStatus::Complete);
        let raw = finding.raw_context();
        assert_eq!(raw["filings_analyzed"], 2);
        assert_eq!(raw["going_concern_warnings"], 1);
        assert_eq!(raw["restatements"], 1);
        assert_eq!(raw["non_clean_audit_opinions"], 1);
        assert_eq!(raw["recent_filings"][0]["date"], "2024-03-01");
        assert_eq!(raw["auditor_history"], "No auditor history available");
    }
}
