//! SurrealDB-backed DataStore implementation
//!
//! Translates [`SearchQuery`] into parameterized SurrealQL. Field and
//! collection names are validated identifiers; every value travels as a
//! binding.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::handle::{connect, StoreConfig};
use crate::migrations::{init_collections, CollectionSpec};
use crate::storage_traits::{
    validate_identifier, AggregateQuery, Clause, Combine, DataStore, Document, SearchQuery,
    SortOrder, StoreResult,
};

/// SurrealDB-backed implementation of [`DataStore`].
#[derive(Clone)]
pub struct SurrealDataStore {
    db: Surreal<Any>,
}

impl SurrealDataStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory(specs: &[CollectionSpec]) -> StoreResult<Self> {
        Self::connect(&StoreConfig::in_memory(), specs).await
    }

    /// Connect using `config` and make sure every collection exists.
    pub async fn connect(config: &StoreConfig, specs: &[CollectionSpec]) -> StoreResult<Self> {
        let db = connect(config).await?;
        init_collections(&db, specs).await?;
        info!(url = %config.url, "SurrealDataStore ready");
        Ok(Self { db })
    }
}

/// Build the `SELECT` statement and bindings for a search.
pub(crate) fn build_search(
    collection: &str,
    query: &SearchQuery,
) -> StoreResult<(String, BTreeMap<String, Value>)> {
    validate_identifier(collection)?;

    let mut bindings = BTreeMap::new();
    bindings.insert("collection".to_string(), Value::String(collection.to_string()));

    let mut conditions = Vec::with_capacity(query.clauses.len());
    for (i, clause) in query.clauses.iter().enumerate() {
        let field = clause.field();
        validate_identifier(field)?;
        let param = format!("p{i}");
        let condition = match clause {
            Clause::Match { text, .. } => {
                bindings.insert(param.clone(), Value::String(text.to_lowercase()));
                format!("string::contains(string::lowercase(<string> ({field} ?? '')), ${param})")
            }
            Clause::Term { value, .. } => {
                bindings.insert(param.clone(), value.clone());
                format!("${param} INSIDE array::flatten([{field}])")
            }
            Clause::OneOf { values, .. } => {
                bindings.insert(param.clone(), Value::Array(values.clone()));
                format!("array::len(array::intersect(array::flatten([{field}]), ${param})) > 0")
            }
        };
        conditions.push(condition);
    }

    let mut sql = "SELECT * OMIT id FROM type::table($collection)".to_string();
    if !conditions.is_empty() {
        let joiner = match query.combine {
            Combine::All => " AND ",
            Combine::Any => " OR ",
        };
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(joiner));
    }
    if let Some(sort) = &query.sort {
        validate_identifier(&sort.field)?;
        let order = match sort.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        sql.push_str(&format!(" ORDER BY {} {order}", sort.field));
    }
    sql.push_str(&format!(" LIMIT {}", query.limit));

    Ok((sql, bindings))
}

/// SurrealDB rejects an `id` in CONTENT that differs from the record id.
fn strip_record_id(mut document: Document) -> Document {
    if let Value::Object(map) = &mut document {
        map.remove("id");
    }
    document
}

impl SurrealDataStore {
    async fn run(&self, sql: String, bindings: BTreeMap<String, Value>) -> StoreResult<Vec<Document>> {
        let mut request = self.db.query(sql);
        for (name, value) in bindings {
            request = request.bind((name, value));
        }
        let mut response = request.await?;
        let rows: Vec<Document> = response
            .take(0)
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;
        Ok(rows)
    }
}

#[async_trait]
impl DataStore for SurrealDataStore {
    #[instrument(skip(self, query), fields(collection = %collection))]
    async fn search(&self, collection: &str, query: &SearchQuery) -> StoreResult<Vec<Document>> {
        let (sql, bindings) = build_search(collection, query)?;
        debug!(%sql, "search");
        self.run(sql, bindings).await
    }

    #[instrument(skip_all)]
    async fn aggregate(&self, query: &AggregateQuery) -> StoreResult<Vec<Document>> {
        debug!(statement = %query.statement, "aggregate");
        self.run(query.statement.clone(), query.bindings.clone()).await
    }

    #[instrument(skip(self))]
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        validate_identifier(collection)?;
        let mut bindings = BTreeMap::new();
        bindings.insert("collection".to_string(), Value::String(collection.to_string()));
        bindings.insert("id".to_string(), Value::String(id.to_string()));
        let rows = self
            .run(
                "SELECT * OMIT id FROM type::thing($collection, $id)".to_string(),
                bindings,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, document))]
    async fn put(&self, collection: &str, id: &str, document: Document) -> StoreResult<()> {
        validate_identifier(collection)?;
        self.db
            .query("UPSERT type::thing($collection, $id) CONTENT $document RETURN NONE")
            .bind(("collection", collection.to_string()))
            .bind(("id", id.to_string()))
            .bind(("document", strip_record_id(document)))
            .await?
            .check()?;
        debug!("document stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_without_clauses_has_no_where() {
        let (sql, bindings) = build_search("investigations", &SearchQuery::all_of().limit(3)).unwrap();
        assert_eq!(sql, "SELECT * OMIT id FROM type::table($collection) LIMIT 3");
        assert_eq!(bindings["collection"], json!("investigations"));
    }

    #[test]
    fn search_binds_every_value() {
        let query = SearchQuery::any_of()
            .with_match("name", "Acme Corp")
            .with_term("parent_entity_id", "E-1")
            .sorted_by("filing_date", SortOrder::Desc)
            .limit(20);
        let (sql, bindings) = build_search("entities", &query).unwrap();

        assert!(sql.contains(" WHERE "));
        assert!(sql.contains(" OR "));
        assert!(sql.ends_with("ORDER BY filing_date DESC LIMIT 20"));
        assert!(!sql.contains("Acme"));
        assert_eq!(bindings["p0"], json!("acme corp"));
        assert_eq!(bindings["p1"], json!("E-1"));
    }

    #[test]
    fn search_rejects_unsafe_sort_field() {
        let query = SearchQuery::all_of().sorted_by("x; DELETE entities", SortOrder::Asc);
        assert!(build_search("entities", &query).is_err());
    }

    #[test]
    fn record_id_is_stripped_from_content() {
        let doc = strip_record_id(json!({"id": "x", "name": "Acme"}));
        assert_eq!(doc, json!({"name": "Acme"}));
    }
}
