//! Host abstractions the persistence services run against.
//!
//! SYSTEM CONTEXT
//! ==============
//! The services never touch a concrete host API. Key-value storage, the
//! address bar, and the clipboard each sit behind a small trait so the same
//! logic runs against in-memory fakes in tests, a JSON file for the CLI, or
//! a browser binding supplied by an embedding host.

pub mod file;
pub mod memory;
pub mod navigator;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use navigator::{Clipboard, ClipboardError, MemoryClipboard, MemoryNavigator, Navigator};

/// Error returned by [`KeyValueStore`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The write would push the store past its capacity.
    #[error("storage quota exceeded: {requested} bytes requested, limit {limit}")]
    QuotaExceeded { requested: usize, limit: usize },
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Flat string key-value storage with localStorage semantics.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Missing keys are `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or overwrite a value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// All keys currently present, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Bytes an entry counts against a quota.
#[must_use]
pub fn entry_bytes(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Check a prospective write against an optional quota.
///
/// `used` is the current total, `replaced` the size of any entry being
/// overwritten, and `added` the size of the new entry.
pub(crate) fn check_quota(quota: Option<usize>, used: usize, replaced: usize, added: usize) -> Result<(), StoreError> {
    let Some(limit) = quota else {
        return Ok(());
    };
    let requested = used.saturating_sub(replaced) + added;
    if requested > limit {
        return Err(StoreError::QuotaExceeded { requested, limit });
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
