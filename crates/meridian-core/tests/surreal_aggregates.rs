//! The specialists' aggregate statements, run against SurrealDB over `mem://`.

use chrono::{Duration, SecondsFormat, Utc};
use meridian_core::tasks::queries;
use meridian_core::Collections;
use meridian_state::{DataStore, Document, SurrealDataStore};
use serde_json::{json, Value};

async fn store() -> (SurrealDataStore, Collections) {
    let collections = Collections::default();
    let store = SurrealDataStore::in_memory(&collections.specs())
        .await
        .expect("in-memory SurrealDB");
    (store, collections)
}

async fn put_all(store: &SurrealDataStore, collection: &str, id_field: &str, docs: Vec<Value>) {
    for doc in docs {
        let id = doc[id_field].as_str().unwrap().to_string();
        store.put(collection, &id, doc).await.unwrap();
    }
}

fn days_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn number(row: &Document, field: &str) -> f64 {
    row[field].as_f64().unwrap_or_else(|| panic!("{field} missing in {row}"))
}

#[tokio::test]
async fn financial_trend_keeps_annual_filings_oldest_first() {
    let (store, c) = store().await;
    put_all(
        &store,
        &c.filings,
        "filing_id",
        vec![
            json!({"filing_id": "F-2", "entity_name": "Acme Corp", "filing_type": "10-K", "filing_date": "2023-03-01", "revenue": 120, "auditor": "EY"}),
            json!({"filing_id": "F-1", "entity_name": "Acme Corp", "filing_type": "10-K", "filing_date": "2022-03-01", "revenue": 100, "auditor": "KPMG"}),
            json!({"filing_id": "F-3", "entity_name": "Acme Corp", "filing_type": "8-K", "filing_date": "2023-06-01", "auditor": "EY"}),
            json!({"filing_id": "F-4", "entity_name": "Globex", "filing_type": "10-K", "filing_date": "2021-03-01", "auditor": "PwC"}),
        ],
    )
    .await;

    let trend = store
        .aggregate(&queries::financial_trend(&c.filings, "ACME"))
        .await
        .unwrap();
    assert_eq!(trend.len(), 2);
    assert_eq!(trend[0]["filing_date"], "2022-03-01");
    assert_eq!(number(&trend[1], "revenue"), 120.0);

    let auditors = store
        .aggregate(&queries::auditor_changes(&c.filings, "acme"))
        .await
        .unwrap();
    let annual = auditors
        .iter()
        .find(|row| row["filing_type"] == "10-K")
        .expect("10-K group");
    let list = annual["auditor_list"].as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.contains(&json!("KPMG")));
    assert!(list.contains(&json!("EY")));
}

#[tokio::test]
async fn legal_exposure_counts_by_kind() {
    let (store, c) = store().await;
    put_all(
        &store,
        &c.legal_cases,
        "case_id",
        vec![
            json!({"case_id": "C-1", "entity_names": ["Acme Corp"], "case_type": "regulatory", "status": "active", "penalty_amount": 1000000}),
            json!({"case_id": "C-2", "entity_names": ["Acme Corp", "J. Doe"], "case_type": "criminal", "status": "closed", "settlement_amount": 500000}),
            json!({"case_id": "C-3", "entity_names": ["Acme Corp"], "case_type": "sanctions", "status": "active", "is_sanction": true}),
            json!({"case_id": "C-4", "entity_names": ["Globex"], "case_type": "criminal", "status": "active"}),
        ],
    )
    .await;

    let rows = store
        .aggregate(&queries::legal_exposure(&c.legal_cases, "Acme Corp"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(number(row, "total_cases"), 3.0);
    assert_eq!(number(row, "active_cases"), 2.0);
    assert_eq!(number(row, "regulatory_actions"), 1.0);
    assert_eq!(number(row, "criminal_cases"), 1.0);
    assert_eq!(number(row, "sanctions"), 1.0);
    assert_eq!(number(row, "total_penalties"), 1_000_000.0);
    assert_eq!(number(row, "total_settlements"), 500_000.0);
}

#[tokio::test]
async fn news_windows_split_recent_from_historical() {
    let (store, c) = store().await;
    put_all(
        &store,
        &c.news,
        "article_id",
        vec![
            json!({"article_id": "N-1", "entity_names": ["Acme Corp"], "published_at": days_ago(10), "sentiment_score": -0.8, "sentiment_label": "negative"}),
            json!({"article_id": "N-2", "entity_names": ["Acme Corp"], "published_at": days_ago(100), "sentiment_score": 0.4, "sentiment_label": "positive"}),
            json!({"article_id": "N-3", "entity_names": ["Acme Corp"], "published_at": days_ago(800), "sentiment_score": -0.2, "sentiment_label": "negative"}),
            json!({"article_id": "N-4", "entity_names": ["Globex"], "published_at": days_ago(5), "sentiment_score": -0.9, "sentiment_label": "negative"}),
        ],
    )
    .await;

    let articles = |rows: &[Document]| rows.iter().map(|r| number(r, "article_count")).sum::<f64>();

    let one_year = store
        .aggregate(&queries::sentiment_trend(&c.news, "acme", 365))
        .await
        .unwrap();
    assert_eq!(articles(&one_year[..]), 2.0);

    let five_years = store
        .aggregate(&queries::sentiment_trend(&c.news, "acme", 1825))
        .await
        .unwrap();
    assert_eq!(articles(&five_years[..]), 3.0);

    let spike = store
        .aggregate(&queries::news_volume_spike(&c.news, "acme", 30))
        .await
        .unwrap();
    assert_eq!(spike.len(), 1);
    assert_eq!(number(&spike[0], "recent_count"), 1.0);
    assert_eq!(number(&spike[0], "historical_count"), 2.0);
    assert_eq!(number(&spike[0], "recent_negative"), 1.0);
    assert_eq!(number(&spike[0], "historical_negative"), 1.0);
}

#[tokio::test]
async fn geo_risk_groups_entity_and_direct_subsidiaries() {
    let (store, c) = store().await;
    put_all(
        &store,
        &c.entities,
        "entity_id",
        vec![
            json!({"entity_id": "E-1", "name": "Acme Holdings", "country_code": "US", "jurisdiction": "Delaware"}),
            json!({"entity_id": "E-2", "name": "Acme BVI One", "parent_entity_id": "E-1", "country_code": "VG", "jurisdiction": "BVI"}),
            json!({"entity_id": "E-3", "name": "Acme BVI Two", "parent_entity_id": "E-1", "country_code": "VG", "jurisdiction": "BVI"}),
            json!({"entity_id": "E-4", "name": "Globex", "country_code": "KY", "jurisdiction": "Cayman Islands"}),
        ],
    )
    .await;

    let rows = store
        .aggregate(&queries::geo_risk(&c.entities, "E-1"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["jurisdiction"], "BVI");
    assert_eq!(number(&rows[0], "entity_count"), 2.0);
    assert_eq!(rows[1]["jurisdiction"], "Delaware");
}
