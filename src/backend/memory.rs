//! In-process key-value store.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{KeyValueStore, StoreError, check_quota, entry_bytes};

/// `HashMap`-backed [`KeyValueStore`] with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once key+value bytes would exceed `limit`.
    #[must_use]
    pub fn with_quota(limit: usize) -> Self {
        Self { entries: RwLock::new(HashMap::new()), quota: Some(limit) }
    }

    /// Total key+value bytes currently held.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries.read().iter().map(|(k, v)| entry_bytes(k, v)).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        let used = entries.iter().map(|(k, v)| entry_bytes(k, v)).sum();
        let replaced = entries.get(key).map_or(0, |old| entry_bytes(key, old));
        check_quota(self.quota, used, replaced, entry_bytes(key, value))?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
