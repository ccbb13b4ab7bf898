//! SurrealQL aggregate statements used by the specialists.
//!
//! Each statement starts with a `-- meridian:<name>` marker line so fakes and
//! logs can tell them apart. Name matches are case-insensitive substring
//! matches against `$needle`; collections are bound as `$table`.

use meridian_state::AggregateQuery;

pub const FINANCIAL_TREND: &str = "meridian:financial_trend";
pub const AUDITOR_CHANGES: &str = "meridian:auditor_changes";
pub const LEGAL_EXPOSURE: &str = "meridian:legal_exposure";
pub const SENTIMENT_TREND: &str = "meridian:sentiment_trend";
pub const NEWS_VOLUME_SPIKE: &str = "meridian:news_volume_spike";
pub const GEO_RISK: &str = "meridian:geo_risk";

fn name_query(marker: &str, body: &str, table: &str, target: &str) -> AggregateQuery {
    AggregateQuery::new(format!("-- {marker}\n{body}"))
        .bind("table", table)
        .bind("needle", target.to_lowercase())
}

/// Annual filings over time, oldest first.
pub fn financial_trend(filings: &str, target: &str) -> AggregateQuery {
    name_query(
        FINANCIAL_TREND,
        "SELECT filing_date, revenue, net_income, total_assets, total_debt, \
         auditor_opinion, going_concern, restatement \
         FROM type::table($table) \
         WHERE string::contains(string::lowercase(<string> (entity_name ?? '')), $needle) \
         AND filing_type IN ['10-K', 'annual'] \
         ORDER BY filing_date ASC",
        filings,
        target,
    )
}

/// Distinct auditors per filing type.
pub fn auditor_changes(filings: &str, target: &str) -> AggregateQuery {
    name_query(
        AUDITOR_CHANGES,
        "SELECT filing_type, array::group(auditor) AS auditor_list \
         FROM type::table($table) \
         WHERE string::contains(string::lowercase(<string> (entity_name ?? '')), $needle) \
         GROUP BY filing_type",
        filings,
        target,
    )
}

/// Case counts, penalties, and settlements for the target.
pub fn legal_exposure(legal_cases: &str, target: &str) -> AggregateQuery {
    name_query(
        LEGAL_EXPOSURE,
        "SELECT count() AS total_cases, \
         count(status = 'active') AS active_cases, \
         math::sum(penalty_amount ?? 0) AS total_penalties, \
         math::sum(settlement_amount ?? 0) AS total_settlements, \
         count(case_type = 'regulatory') AS regulatory_actions, \
         count(case_type = 'criminal') AS criminal_cases, \
         count(is_sanction = true) AS sanctions \
         FROM type::table($table) \
         WHERE string::contains(string::lowercase(<string> (entity_names ?? '')), $needle) \
         GROUP ALL",
        legal_cases,
        target,
    )
}

/// Monthly sentiment over the last `days` days.
pub fn sentiment_trend(news: &str, target: &str, days: u32) -> AggregateQuery {
    name_query(
        SENTIMENT_TREND,
        "SELECT time::group(<datetime> published_at, 'month') AS month, \
         math::mean(sentiment_score) AS avg_sentiment, \
         count() AS article_count, \
         count(sentiment_label = 'negative') AS negative_count, \
         count(sentiment_label = 'positive') AS positive_count \
         FROM type::table($table) \
         WHERE string::contains(string::lowercase(<string> (entity_names ?? '')), $needle) \
         AND <datetime> published_at >= time::now() - <duration> $window \
         GROUP BY month ORDER BY month ASC",
        news,
        target,
    )
    .bind("window", format!("{days}d"))
}

/// Article volume in the last `days` days against everything older.
pub fn news_volume_spike(news: &str, target: &str, days: u32) -> AggregateQuery {
    name_query(
        NEWS_VOLUME_SPIKE,
        "SELECT count(<datetime> published_at >= time::now() - <duration> $window) AS recent_count, \
         count(<datetime> published_at < time::now() - <duration> $window) AS historical_count, \
         count(<datetime> published_at >= time::now() - <duration> $window \
         AND sentiment_label = 'negative') AS recent_negative, \
         count(<datetime> published_at < time::now() - <duration> $window \
         AND sentiment_label = 'negative') AS historical_negative \
         FROM type::table($table) \
         WHERE string::contains(string::lowercase(<string> (entity_names ?? '')), $needle) \
         GROUP ALL",
        news,
        target,
    )
    .bind("window", format!("{days}d"))
}

/// Entity counts per jurisdiction for an entity and its direct subsidiaries.
pub fn geo_risk(entities: &str, entity_id: &str) -> AggregateQuery {
    AggregateQuery::new(format!(
        "-- {GEO_RISK}\n\
         SELECT country_code, jurisdiction, count() AS entity_count \
         FROM type::table($table) \
         WHERE entity_id = $entity_id OR parent_entity_id = $entity_id \
         GROUP BY country_code, jurisdiction \
         ORDER BY entity_count DESC"
    ))
    .bind("table", entities)
    .bind("entity_id", entity_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_are_bound_not_spliced() {
        let q = legal_exposure("legal_cases", "Acme'; REMOVE TABLE x; --");
        assert!(q.statement.starts_with("-- meridian:legal_exposure\n"));
        assert!(!q.statement.contains("Acme"));
        assert_eq!(q.bindings["needle"], json!("acme'; remove table x; --"));
        assert_eq!(q.bindings["table"], json!("legal_cases"));
    }

    #[test]
    fn windows_are_in_days() {
        let q = sentiment_trend("news", "Acme", 1825);
        assert_eq!(q.bindings["window"], json!("1825d"));
        let q = news_volume_spike("news", "Acme", 30);
        assert_eq!(q.bindings["window"], json!("30d"));
    }
}
