//! Named-context catalog backends for zulipgpt.
//!
//! - `sqlite` (default): a single-table SQLite database
//! - `in_memory`: non-persistent, for tests and throwaway sessions

pub mod in_memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryContextStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteContextStore;

use std::sync::Arc;
use zulipgpt_config::StoreConfig;
use zulipgpt_core::context::ContextCatalog;
use zulipgpt_core::error::StoreError;

/// Open the catalog backend named in the configuration.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn ContextCatalog>, StoreError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryContextStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteContextStore::open(&config.path).await?)),
        other => Err(StoreError::Storage(format!("Unknown store backend: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_from_config() {
        let config = StoreConfig {
            backend: "memory".into(),
            ..StoreConfig::default()
        };
        let catalog = open(&config).await.unwrap();
        assert_eq!(catalog.name(), "in_memory");
    }

    #[tokio::test]
    async fn sqlite_backend_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: "sqlite".into(),
            path: dir.path().join("data.db"),
        };
        let catalog = open(&config).await.unwrap();
        assert_eq!(catalog.name(), "sqlite");
        assert!(catalog.upsert("x", "y").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let config = StoreConfig {
            backend: "postgres".into(),
            ..StoreConfig::default()
        };
        assert!(open(&config).await.is_err());
    }
}
