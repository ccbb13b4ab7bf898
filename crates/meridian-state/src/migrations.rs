//! SurrealDB collection setup
//!
//! Collections are schemaless; setup only declares the tables and the
//! secondary indexes the investigation queries filter or sort on.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::storage_traits::{validate_identifier, StoreResult};

/// A collection and the fields worth indexing on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub indexed_fields: Vec<String>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, indexed_fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            indexed_fields: indexed_fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Render the SurrealQL for one collection.
pub fn collection_ddl(spec: &CollectionSpec) -> StoreResult<String> {
    validate_identifier(&spec.name)?;
    let mut sql = format!("DEFINE TABLE IF NOT EXISTS {} SCHEMALESS;\n", spec.name);
    for field in &spec.indexed_fields {
        validate_identifier(field)?;
        let index_name = format!("idx_{}_{}", spec.name, field.replace('.', "_"));
        sql.push_str(&format!(
            "DEFINE INDEX IF NOT EXISTS {index_name} ON TABLE {} FIELDS {field};\n",
            spec.name
        ));
    }
    Ok(sql)
}

/// Initialize all collections.
///
/// Safe to call multiple times (idempotent).
pub async fn init_collections(db: &Surreal<Any>, specs: &[CollectionSpec]) -> StoreResult<()> {
    info!("Initializing MERIDIAN collections");

    for spec in specs {
        debug!(collection = %spec.name, "defining collection");
        let sql = collection_ddl(spec)?;
        db.query(sql)
            .await
            .map_err(|e| StoreError::SchemaSetup(e.to_string()))?
            .check()
            .map_err(|e| StoreError::SchemaSetup(e.to_string()))?;
    }

    info!(count = specs.len(), "collections initialized");
    Ok(())
}
