//! Named contexts — user-defined system-prompt snippets addressed by `!name`.
//!
//! The catalog is an ordered key/value store. Names are case-insensitive and
//! a fixed set of names is reserved for directives; implementations must
//! refuse to create, overwrite, or delete those.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// Names that can never be used for a named context.
pub const RESERVED_CONTEXT_NAMES: [&str; 12] = [
    "topic", "stream", "new", "help", "contexts", "gpt3", "gpt4", "set", "unset", "me",
    "admin", "stats",
];

/// Whether `name` collides with a directive, after normalization.
pub fn is_reserved(name: &str) -> bool {
    let name = normalize_name(name);
    RESERVED_CONTEXT_NAMES.contains(&name.as_str())
}

/// Normalize a context name for storage and lookup.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A stored context snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedContext {
    /// Lower-cased unique name
    pub name: String,
    /// Text injected as a system turn
    pub value: String,
}

impl NamedContext {
    pub fn new(name: impl AsRef<str>, value: impl Into<String>) -> Self {
        Self {
            name: normalize_name(name.as_ref()),
            value: value.into(),
        }
    }
}

/// The core ContextCatalog trait.
///
/// Implementations: SQLite, in-memory. Writes must be serialized and visible
/// to the next `list_all` of the same process.
#[async_trait]
pub trait ContextCatalog: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// All contexts, in insertion order.
    async fn list_all(&self) -> std::result::Result<Vec<NamedContext>, StoreError>;

    /// Insert or update a context.
    ///
    /// Returns `Ok(false)` without touching the store when the name is
    /// reserved.
    async fn upsert(&self, name: &str, value: &str) -> std::result::Result<bool, StoreError>;

    /// Delete a context. Absent names are a no-op.
    ///
    /// Returns `Ok(false)` without touching the store when the name is
    /// reserved.
    async fn delete(&self, name: &str) -> std::result::Result<bool, StoreError>;

    /// Look up a single context by name (case-insensitive).
    async fn get(&self, name: &str) -> std::result::Result<Option<NamedContext>, StoreError> {
        let wanted = normalize_name(name);
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .find(|c| c.name == wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_are_case_insensitive() {
        assert!(is_reserved("help"));
        assert!(is_reserved("GPT4"));
        assert!(is_reserved("Stats"));
        assert!(!is_reserved("cicada"));
    }

    #[test]
    fn padded_reserved_names_are_reserved() {
        assert!(is_reserved(" help "));
        assert!(is_reserved("stats\t"));
        assert!(is_reserved("\nGPT3"));
    }

    #[test]
    fn names_are_normalized() {
        let ctx = NamedContext::new(" Cicada ", "Cicada is a business wallet");
        assert_eq!(ctx.name, "cicada");
        assert_eq!(ctx.value, "Cicada is a business wallet");
    }
}
