//! Read access to persisted investigations and the entity index.

use meridian_state::{DataStore, Document, SearchQuery, SortOrder, StoreError};

use crate::config::Collections;
use crate::domain::Investigation;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stored investigation is unreadable: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Fetch one investigation by id.
pub async fn get_investigation(
    store: &dyn DataStore,
    collections: &Collections,
    investigation_id: &str,
) -> Result<Option<Investigation>, LookupError> {
    match store.get(&collections.investigations, investigation_id).await? {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

/// Most recently started investigations first.
pub async fn list_investigations(
    store: &dyn DataStore,
    collections: &Collections,
    limit: usize,
) -> Result<Vec<Investigation>, LookupError> {
    let docs = store
        .search(
            &collections.investigations,
            &SearchQuery::all_of()
                .sorted_by("started_at", SortOrder::Desc)
                .limit(limit),
        )
        .await?;
    docs.into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(LookupError::from))
        .collect()
}

/// Entities whose name or alias contains `query`, name matches first.
pub async fn search_entities(
    store: &dyn DataStore,
    collections: &Collections,
    query: &str,
    limit: usize,
) -> Result<Vec<Document>, LookupError> {
    let by_name = store
        .search(
            &collections.entities,
            &SearchQuery::all_of().with_match("name", query).limit(limit),
        )
        .await?;
    let by_alias = store
        .search(
            &collections.entities,
            &SearchQuery::all_of().with_match("aliases", query).limit(limit),
        )
        .await?;

    let mut hits: Vec<Document> = Vec::with_capacity(limit);
    for doc in by_name.into_iter().chain(by_alias) {
        let id = doc.get("entity_id");
        if id.is_some() && hits.iter().any(|h| h.get("entity_id") == id) {
            continue;
        }
        hits.push(doc);
        if hits.len() == limit {
            break;
        }
    }
    Ok(hits)
}
