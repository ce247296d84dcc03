//! Persistence tuning, loaded from environment variables.

use std::time::Duration;

pub const DEFAULT_STORAGE_PREFIX: &str = "design-system";
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// Knobs shared by the storage manager and the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Namespace for every key the storage manager writes.
    pub storage_prefix: String,
    /// Quiet period before a store change is saved and mirrored to the URL.
    pub debounce: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_owned(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

impl PersistenceConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let storage_prefix = match std::env::var("SWATCHBOOK_STORAGE_PREFIX") {
            Ok(prefix) if !prefix.trim().is_empty() => prefix.trim().to_owned(),
            _ => DEFAULT_STORAGE_PREFIX.to_owned(),
        };
        Self {
            storage_prefix,
            debounce: Duration::from_millis(env_parse("SWATCHBOOK_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)),
        }
    }
}

/// Parse `key` from the environment, falling back to `default` when the
/// variable is unset or does not parse as `T`.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
