//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryDataStore`, which evaluates [`SearchQuery`] against JSON
//! documents held in memory and answers aggregate statements from canned rows.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::storage_traits::*;

/// In-memory document store.
///
/// Documents keep insertion order within a collection; `put` on an existing
/// id replaces the document in place. Aggregate statements are answered by
/// the first registered responder whose needle occurs in the statement text,
/// or with no rows.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    collections: Mutex<HashMap<String, Vec<(String, Document)>>>,
    aggregates: Mutex<Vec<(String, Vec<Document>)>>,
    unavailable: AtomicBool,
    puts: AtomicU64,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed documents into a collection, using `id_field` as the document id.
    pub fn with_documents(self, collection: &str, id_field: &str, docs: Vec<Document>) -> Self {
        {
            let mut collections = self.collections.lock().unwrap();
            let entries = collections.entry(collection.to_string()).or_default();
            for (i, doc) in docs.into_iter().enumerate() {
                let id = doc
                    .get(id_field)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{collection}-{i}"));
                upsert(entries, id, doc);
            }
        }
        self
    }

    /// Answer any aggregate statement containing `needle` with `rows`.
    pub fn with_aggregate(self, needle: &str, rows: Vec<Document>) -> Self {
        self.aggregates
            .lock()
            .unwrap()
            .push((needle.to_string(), rows));
        self
    }

    /// Make every subsequent call fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> u64 {
        self.puts.load(AtomicOrdering::SeqCst)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Connection("store marked unavailable".to_string()));
        }
        Ok(())
    }
}

fn upsert(entries: &mut Vec<(String, Document)>, id: String, doc: Document) {
    match entries.iter_mut().find(|(existing, _)| *existing == id) {
        Some(slot) => slot.1 = doc,
        None => entries.push((id, doc)),
    }
}

/// Collect every value reachable through a dotted path, flattening arrays.
fn field_values<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(v) = map.get(segment) {
                        next.push(v);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(v) = item.get(segment) {
                            next.push(v);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn clause_holds(doc: &Value, clause: &Clause) -> bool {
    let values = field_values(doc, clause.field());
    match clause {
        Clause::Match { text, .. } => {
            let needle = text.to_lowercase();
            values
                .iter()
                .filter_map(|v| v.as_str())
                .any(|s| s.to_lowercase().contains(&needle))
        }
        Clause::Term { value, .. } => values.iter().any(|v| *v == value),
        Clause::OneOf { values: wanted, .. } => values.iter().any(|v| wanted.contains(*v)),
    }
}

fn matches(doc: &Value, query: &SearchQuery) -> bool {
    if query.clauses.is_empty() {
        return true;
    }
    match query.combine {
        Combine::All => query.clauses.iter().all(|c| clause_holds(doc, c)),
        Combine::Any => query.clauses.iter().any(|c| clause_holds(doc, c)),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, Some(_)) | (Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None) | (Some(_), Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn search(&self, collection: &str, query: &SearchQuery) -> StoreResult<Vec<Document>> {
        self.check_available()?;
        let collections = self.collections.lock().unwrap();
        let mut hits: Vec<Document> = collections
            .get(collection)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, doc)| matches(doc, query))
                    .map(|(_, doc)| doc.clone())
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = &query.sort {
            hits.sort_by(|a, b| {
                let ord = compare_values(
                    field_values(a, &sort.field).first().copied(),
                    field_values(b, &sort.field).first().copied(),
                );
                match sort.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn aggregate(&self, query: &AggregateQuery) -> StoreResult<Vec<Document>> {
        self.check_available()?;
        let aggregates = self.aggregates.lock().unwrap();
        Ok(aggregates
            .iter()
            .find(|(needle, _)| query.statement.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.check_available()?;
        let collections = self.collections.lock().unwrap();
        Ok(collections.get(collection).and_then(|entries| {
            entries
                .iter()
                .find(|(existing, _)| existing == id)
                .map(|(_, doc)| doc.clone())
        }))
    }

    async fn put(&self, collection: &str, id: &str, document: Document) -> StoreResult<()> {
        self.check_available()?;
        let mut collections = self.collections.lock().unwrap();
        let entries = collections.entry(collection.to_string()).or_default();
        upsert(entries, id.to_string(), document);
        self.puts.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_paths_flatten_arrays() {
        let doc = json!({
            "employment_history": [
                {"entity_name": "Acme Corp"},
                {"entity_name": "Globex"}
            ]
        });
        let values = field_values(&doc, "employment_history.entity_name");
        assert_eq!(values.len(), 2);
        assert_eq!(values[1], &json!("Globex"));
    }

    #[test]
    fn match_is_case_insensitive_over_array_elements() {
        let doc = json!({"entity_names": ["ACME Corp", "Acme Holdings"]});
        let clause = Clause::Match {
            field: "entity_names".into(),
            text: "acme corp".into(),
        };
        assert!(clause_holds(&doc, &clause));
    }

    #[test]
    fn missing_values_sort_first_ascending() {
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(
            compare_values(Some(&json!("2024")), Some(&json!("2023"))),
            Ordering::Greater
        );
    }
}
