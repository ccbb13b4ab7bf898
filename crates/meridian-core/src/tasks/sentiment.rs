//! Sentiment and narrative: coverage trends, volume spikes, and headlines.

use async_trait::async_trait;
use meridian_state::{SearchQuery, SortOrder};
use serde_json::{json, Value};
use tracing::instrument;

use super::{field, names, prompts, queries, Task, TaskContext, TaskEnv, TaskError};
use crate::domain::Finding;

const ONE_YEAR_DAYS: u32 = 365;
const FIVE_YEAR_DAYS: u32 = 1825;
const SPIKE_WINDOW_DAYS: u32 = 30;
const FIVE_YEAR_ROWS: usize = 12;
const NEGATIVE_HEADLINES: usize = 10;
const POSITIVE_HEADLINES: usize = 5;

pub struct SentimentTask {
    env: TaskEnv,
}

fn headline(article: &Value) -> Value {
    json!({
        "title": field(article, "title"),
        "source": field(article, "source"),
        "published_at": field(article, "published_at"),
        "sentiment_score": field(article, "sentiment_score"),
        "summary": field(article, "summary"),
    })
}

impl SentimentTask {
    pub fn new(env: TaskEnv) -> Self {
        Self { env }
    }

    async fn headlines(&self, target: &str, label: &str, limit: usize) -> Result<Vec<Value>, TaskError> {
        let articles = self
            .env
            .search(
                &self.env.collections.news,
                &SearchQuery::all_of()
                    .with_match("entity_names", target)
                    .with_term("sentiment_label", label)
                    .sorted_by("published_at", SortOrder::Desc)
                    .limit(limit),
            )
            .await?;
        Ok(articles.iter().map(headline).collect())
    }

    async fn gather(&self, target: &str) -> Result<Value, TaskError> {
        let news = &self.env.collections.news;
        let trend_1y = self
            .env
            .aggregate(&queries::sentiment_trend(news, target, ONE_YEAR_DAYS))
            .await?;
        let trend_5y = self
            .env
            .aggregate(&queries::sentiment_trend(news, target, FIVE_YEAR_DAYS))
            .await?;
        let spike = self
            .env
            .aggregate(&queries::news_volume_spike(news, target, SPIKE_WINDOW_DAYS))
            .await?;
        let negative = self.headlines(target, "negative", NEGATIVE_HEADLINES).await?;
        let positive = self.headlines(target, "positive", POSITIVE_HEADLINES).await?;

        let trend_5y: Vec<Value> = trend_5y.into_iter().take(FIVE_YEAR_ROWS).collect();
        let spike = spike.into_iter().next().unwrap_or(Value::Null);

        Ok(json!({
            "company": target,
            "sentiment_trend_1y": trend_1y,
            "sentiment_trend_5y": trend_5y,
            "volume_spike_30d": spike,
            "negative_articles": negative,
            "positive_articles": positive,
        }))
    }
}

#[async_trait]
impl Task for SentimentTask {
    fn name(&self) -> &str {
        names::SENTIMENT_NARRATIVE
    }

    #[instrument(skip(self, _context), fields(task = names::SENTIMENT_NARRATIVE))]
    async fn execute(&self, target: &str, _context: &TaskContext) -> Finding {
        let gathered = self.gather(target).await;
        self.env
            .assess(
                names::SENTIMENT_NARRATIVE,
                &prompts::sentiment_narrative(),
                "Analyze sentiment and narrative",
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
    async fn splits_headlines_by_label() {
        let store = MemoryDataStore::new()
            .with_documents(
                "news",
                "article_id",
                vec![
                    json!({"article_id": "N-1", "title": "Acme probed", "entity_names": ["Acme Corp"], "sentiment_label": "negative", "published_at": "2024-01-01"}),
                    json!({"article_id": "N-2", "title": "Acme fined", "entity_names": ["Acme Corp"], "sentiment_label": "negative", "published_at": "2024-05-01"}),
                    json!({"article_id": "N-3", "title": "Acme wins award", "entity_names": ["Acme Corp"], "sentiment_label": "positive", "published_at": "2023-01-01"}),
                    json!({"article_id": "N-4", "title": "Globex falls", "entity_names": ["Globex"], "sentiment_label": "negative"}),
                ],
            )
            .with_aggregate(
                queries::NEWS_VOLUME_SPIKE,
                vec![json!({"recent_count": 4, "historical_count": 1})],
            );
        let reasoner = ScriptedReasoner::new().respond_json(
            names::SENTIMENT_NARRATIVE,
            json!({"findings": "Coverage turned negative", "risk_score": 5.0, "red_flags": []}),
        );
        let env = TaskEnv::new(Arc::new(store), Arc::new(reasoner), &MeridianConfig::default());

        let finding = SentimentTask::new(env)
            .execute("Acme Corp", &TaskContext::default())
            .await;

        assert_eq!(finding.status(), TaskStatus::Complete);
        let raw = finding.raw_context();
        assert_eq!(raw["negative_articles"].as_array().map(Vec::len), Some(2));
        assert_eq!(raw["negative_articles"][0]["title"], "Acme fined");
        assert_eq!(raw["positive_articles"][0]["title"], "Acme wins award");
        assert_eq!(raw["volume_spike_30d"]["recent_count"], 4);
        assert_eq!(raw["sentiment_trend_1y"], json!([]));
    }
}
