//! SQLite context catalog.
//!
//! One table, `contexts(name TEXT PRIMARY KEY, value TEXT NOT NULL)`.
//! Listing follows `rowid`, so a context keeps its original position when
//! its value is overwritten.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};
use zulipgpt_core::context::{ContextCatalog, NamedContext, is_reserved, normalize_name};
use zulipgpt_core::error::StoreError;

/// A SQLite-backed [`ContextCatalog`].
pub struct SqliteContextStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteContextStore {
    /// Open (or create) the catalog at `path`.
    ///
    /// Pass `":memory:"` for an ephemeral database.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let in_memory = path.as_os_str() == ":memory:";

        let options = if in_memory {
            SqliteConnectOptions::from_str(":memory:")
                .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };

        // Every connection to ":memory:" is its own database.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!(path = %path.display(), "SQLite context store initialized");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contexts (
                name  TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("contexts table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }
}

#[async_trait]
impl ContextCatalog for SqliteContextStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn list_all(&self) -> Result<Vec<NamedContext>, StoreError> {
        let rows = sqlx::query("SELECT name, value FROM contexts ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("list contexts: {e}")))?;

        rows.iter()
            .map(|row| -> Result<NamedContext, StoreError> {
                let name: String = row
                    .try_get("name")
                    .map_err(|e| StoreError::QueryFailed(format!("name column: {e}")))?;
                let value: String = row
                    .try_get("value")
                    .map_err(|e| StoreError::QueryFailed(format!("value column: {e}")))?;
                Ok(NamedContext { name, value })
            })
            .collect()
    }

    async fn upsert(&self, name: &str, value: &str) -> Result<bool, StoreError> {
        let name = normalize_name(name);
        if is_reserved(&name) {
            return Ok(false);
        }

        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT INTO contexts (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        )
        .bind(&name)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("upsert context: {e}")))?;

        debug!(name = %name, "Context stored");
        Ok(true)
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let name = normalize_name(name);
        if is_reserved(&name) {
            return Ok(false);
        }

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM contexts WHERE name = ?1")
            .bind(&name)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("delete context: {e}")))?;

        debug!(name = %name, removed = result.rows_affected(), "Context deleted");
        Ok(true)
    }

    async fn get(&self, name: &str) -> Result<Option<NamedContext>, StoreError> {
        let row = sqlx::query("SELECT name, value FROM contexts WHERE name = ?1")
            .bind(normalize_name(name))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get context: {e}")))?;

        row.map(|row| -> Result<NamedContext, StoreError> {
            Ok(NamedContext {
                name: row
                    .try_get("name")
                    .map_err(|e| StoreError::QueryFailed(format!("name column: {e}")))?,
                value: row
                    .try_get("value")
                    .map_err(|e| StoreError::QueryFailed(format!("value column: {e}")))?,
            })
        })
        .transpose()
    }
}
