//! In-memory catalog, useful for testing and throwaway sessions.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use zulipgpt_core::context::{ContextCatalog, NamedContext, is_reserved, normalize_name};
use zulipgpt_core::error::StoreError;

/// A [`ContextCatalog`] kept in a Vec, in insertion order.
#[derive(Clone, Default)]
pub struct InMemoryContextStore {
    entries: Arc<RwLock<Vec<NamedContext>>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a catalog with existing contexts.
    pub fn with_contexts<I, N, V>(contexts: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: Into<String>,
    {
        let entries = contexts
            .into_iter()
            .map(|(n, v)| NamedContext::new(n, v))
            .collect();
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }
}

#[async_trait]
impl ContextCatalog for InMemoryContextStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn list_all(&self) -> Result<Vec<NamedContext>, StoreError> {
        Ok(self.entries.read().await.clone())
    }

    async fn upsert(&self, name: &str, value: &str) -> Result<bool, StoreError> {
        let name = normalize_name(name);
        if is_reserved(&name) {
            return Ok(false);
        }

        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => entries.push(NamedContext {
                name,
                value: value.to_string(),
            }),
        }
        Ok(true)
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let name = normalize_name(name);
        if is_reserved(&name) {
            return Ok(false);
        }
        self.entries.write().await.retain(|c| c.name != name);
        Ok(true)
    }
}
