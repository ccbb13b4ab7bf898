//! SurrealDB connection configuration
//!
//! Supports in-memory, local file (SurrealKV), and remote (WebSocket)
//! connections. Remote connections may sign in as a root or database user.

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StoreError;
use crate::storage_traits::StoreResult;

/// Default on-disk location when no endpoint is configured.
pub const DEFAULT_LOCAL_PATH: &str = ".meridian/db";

/// Credentials for a remote SurrealDB endpoint
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

/// Configuration for the SurrealDB connection
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoint URL (`mem://`, `surrealkv://path`, `ws://host:port`, `wss://...`)
    pub url: String,
    /// Namespace (default: "meridian")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Sign-in credentials for remote endpoints
    pub credentials: Option<Credentials>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: format!("surrealkv://{DEFAULT_LOCAL_PATH}"),
            namespace: "meridian".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }
}

impl StoreConfig {
    /// In-memory configuration (tests, demos).
    pub fn in_memory() -> Self {
        Self {
            url: "mem://".to_string(),
            ..Self::default()
        }
    }

    /// Set custom endpoint URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Set sign-in credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        is_root: bool,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
            is_root,
        });
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_URL (optional, default: local SurrealKV under `.meridian/db`)
    /// - SURREALDB_NAMESPACE (optional, default: "meridian")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_USERNAME / SURREALDB_PASSWORD (optional, both required to sign in)
    /// - SURREALDB_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let credentials = match (
            std::env::var("SURREALDB_USERNAME"),
            std::env::var("SURREALDB_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(Credentials {
                username,
                password,
                is_root: std::env::var("SURREALDB_ROOT")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            }),
            _ => None,
        };

        Self {
            url: std::env::var("SURREALDB_URL").unwrap_or(defaults.url),
            namespace: std::env::var("SURREALDB_NAMESPACE").unwrap_or(defaults.namespace),
            database: std::env::var("SURREALDB_DATABASE").unwrap_or(defaults.database),
            credentials,
        }
    }
}

/// Open a connection described by `config` and select its namespace/database.
#[instrument(skip(config), fields(url = %config.url, namespace = %config.namespace, database = %config.database))]
pub async fn connect(config: &StoreConfig) -> StoreResult<Surreal<Any>> {
    if let Some(path) = config.url.strip_prefix("surrealkv://") {
        std::fs::create_dir_all(path).map_err(|e| {
            StoreError::Connection(format!("Failed to create database directory {path}: {e}"))
        })?;
    }

    let db = surrealdb::engine::any::connect(config.url.as_str())
        .await
        .map_err(|e| StoreError::Connection(format!("Failed to connect to {}: {}", config.url, e)))?;

    if let Some(creds) = &config.credentials {
        if creds.is_root {
            db.signin(Root {
                username: &creds.username,
                password: &creds.password,
            })
            .await
            .map_err(|e| StoreError::Connection(format!("Root authentication failed: {e}")))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &creds.username,
                password: &creds.password,
            })
            .await
            .map_err(|e| StoreError::Connection(format!("Database authentication failed: {e}")))?;
        }
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| {
            StoreError::Connection(format!("Failed to select namespace/database: {e}"))
        })?;

    info!("SurrealDB connected");
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_surrealkv() {
        let config = StoreConfig::default();
        assert_eq!(config.url, "surrealkv://.meridian/db");
        assert_eq!(config.namespace, "meridian");
        assert!(config.credentials.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = StoreConfig::in_memory()
            .with_namespace("dd")
            .with_database("test")
            .with_credentials("root", "secret", true);
        assert_eq!(config.url, "mem://");
        assert_eq!(config.namespace, "dd");
        assert_eq!(config.database, "test");
        assert!(config.credentials.unwrap().is_root);
    }
}
