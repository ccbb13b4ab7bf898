//! Storage trait definitions for MERIDIAN
//!
//! `DataStore` is the single capability the investigation engine consumes:
//! - `search`: typed document search within one collection
//! - `aggregate`: declarative statement returning rows
//! - `get` / `put`: document access by id
//!
//! The engine treats every call as possibly empty-returning and never relies
//! on ordering or transactions across calls. In-memory fakes are provided for
//! testing via the `fakes` module.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A stored document. Collections are schemaless.
pub type Document = Value;

/// A single predicate of a [`SearchQuery`].
///
/// Field names may address nested values with dots
/// (`employment_history.entity_name`); arrays along the path are flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Clause {
    /// Case-insensitive substring match against the field's text.
    Match { field: String, text: String },
    /// Exact equality with the field value (or membership for array fields).
    Term { field: String, value: Value },
    /// The field value equals one of `values`.
    OneOf { field: String, values: Vec<Value> },
}

impl Clause {
    pub fn field(&self) -> &str {
        match self {
            Clause::Match { field, .. } | Clause::Term { field, .. } | Clause::OneOf { field, .. } => {
                field
            }
        }
    }
}

/// How the clauses of a query combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combine {
    /// Every clause must hold.
    All,
    /// At least one clause must hold.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

/// Typed search over one collection.
///
/// A query without clauses matches every document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub clauses: Vec<Clause>,
    pub combine: Combine,
    pub sort: Option<SortKey>,
    pub limit: usize,
}

impl SearchQuery {
    /// Default page size when none is given.
    pub const DEFAULT_LIMIT: usize = 10;

    /// Query whose clauses must all hold.
    pub fn all_of() -> Self {
        Self {
            clauses: Vec::new(),
            combine: Combine::All,
            sort: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    /// Query where any clause may hold.
    pub fn any_of() -> Self {
        Self {
            combine: Combine::Any,
            ..Self::all_of()
        }
    }

    pub fn with_match(mut self, field: impl Into<String>, text: impl Into<String>) -> Self {
        self.clauses.push(Clause::Match {
            field: field.into(),
            text: text.into(),
        });
        self
    }

    pub fn with_term(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Term {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_one_of(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push(Clause::OneOf {
            field: field.into(),
            values,
        });
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(SortKey {
            field: field.into(),
            order,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Declarative statement with named bindings.
///
/// Statements are written in the backend's query language (SurrealQL for
/// [`crate::SurrealDataStore`]); values are always passed as bindings, never
/// spliced into the statement text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateQuery {
    pub statement: String,
    pub bindings: BTreeMap<String, Value>,
}

impl AggregateQuery {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }
}

/// Document store consumed by the investigation engine.
///
/// Guarantees:
/// - `put` followed by `get` on the same id returns the stored document.
/// - `put` on an existing id replaces the document.
/// - `search` returns at most `query.limit` documents.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Search a collection.
    async fn search(&self, collection: &str, query: &SearchQuery) -> StoreResult<Vec<Document>>;

    /// Run a declarative aggregate statement and return its rows.
    async fn aggregate(&self, query: &AggregateQuery) -> StoreResult<Vec<Document>>;

    /// Fetch a document by id. Returns `Ok(None)` if absent.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Insert or replace a document by id.
    async fn put(&self, collection: &str, id: &str, document: Document) -> StoreResult<()>;
}

/// Check that a collection or field name is safe to use as a bare identifier.
///
/// Accepts ASCII alphanumerics and `_`, with `.` separating nested segments.
pub fn validate_identifier(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !segment.starts_with(|c: char| c.is_ascii_digit())
        });
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_clauses_in_order() {
        let q = SearchQuery::any_of()
            .with_match("name", "Acme")
            .with_term("parent_entity_id", "E-1")
            .sorted_by("filing_date", SortOrder::Desc)
            .limit(5);

        assert_eq!(q.combine, Combine::Any);
        assert_eq!(q.clauses.len(), 2);
        assert_eq!(q.clauses[0].field(), "name");
        assert_eq!(q.clauses[1].field(), "parent_entity_id");
        assert_eq!(q.limit, 5);
        assert_eq!(q.sort.unwrap().order, SortOrder::Desc);
    }

    #[test]
    fn identifiers_reject_injection() {
        assert!(validate_identifier("entities").is_ok());
        assert!(validate_identifier("employment_history.entity_name").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("name; DELETE entities").is_err());
        assert!(validate_identifier("a..b").is_err());
        assert!(validate_identifier("1abc").is_err());
    }
}
