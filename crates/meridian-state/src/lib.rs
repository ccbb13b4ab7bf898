//! meridian-state: data-store capability for MERIDIAN investigations
//!
//! The investigation engine reads source records (entities, filings, court
//! cases, news, executives) and persists investigation records through the
//! [`DataStore`] trait defined here.
//!
//! ## Key Components
//!
//! - [`DataStore`]: typed search, aggregate statements, get/put by id
//! - [`SurrealDataStore`]: SurrealDB backend (in-memory, SurrealKV, or remote)
//! - [`fakes::MemoryDataStore`]: in-memory store for tests and demos
//! - [`migrations`]: collection and index setup

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
pub mod storage_traits;
mod surreal_store;

pub use error::StoreError;
pub use handle::{connect, Credentials, StoreConfig, DEFAULT_LOCAL_PATH};
pub use migrations::{init_collections, CollectionSpec};
pub use storage_traits::{
    validate_identifier, AggregateQuery, Clause, Combine, DataStore, Document, SearchQuery,
    SortKey, SortOrder, StoreResult,
};
pub use surreal_store::SurrealDataStore;
