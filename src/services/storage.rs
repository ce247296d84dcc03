//! Storage manager — named design records in a key-value store.
//!
//! DESIGN
//! ======
//! Each design lives whole under `{prefix}:design:{id}`. A separate listing
//! index at `{prefix}:designs` holds only metadata so list views never load
//! full payloads. `{prefix}:current` points at the record auto-save targets.
//!
//! ERROR HANDLING
//! ==============
//! Absence is a normal outcome: reads return `None`, and malformed stored
//! JSON is logged and treated as absent. Only `save_to_storage` and
//! `import_design_from_json` return errors, because their callers surface
//! them to the user directly.
//!
//! TRADE-OFFS
//! ==========
//! Record and index are updated as two sequential writes, with the record
//! rolled back when the index write fails. This is safe for a single writer;
//! two processes sharing one store can interleave index read-modify-write
//! cycles and drop an entry.

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, error, info, warn};

use crate::backend::{KeyValueStore, StoreError};
use crate::design::{DesignMetadata, DesignSystem, ExportEnvelope, FORMAT_VERSION, SavedDesign, now_ms};

/// Assumed capacity used for usage estimates.
pub const STORAGE_QUOTA_BYTES: usize = 10 * 1024 * 1024;

const ID_PREFIX: &str = "design";
const ID_RANDOM_LEN: usize = 9;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const COPY_SUFFIX: &str = " (Copy)";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded; export or delete designs to free up space")]
    QuotaExceeded,
    #[error("failed to save design: {0}")]
    SaveFailed(String),
    #[error("Invalid design system JSON: {0}")]
    ImportInvalid(String),
}

impl From<StoreError> for StorageError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::QuotaExceeded { .. } => Self::QuotaExceeded,
            other => Self::SaveFailed(other.to_string()),
        }
    }
}

/// Approximate usage of the prefixed keys against [`STORAGE_QUOTA_BYTES`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageInfo {
    pub used: usize,
    pub available: usize,
    pub total: usize,
    pub percentage: f64,
}

pub struct StorageManager {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl StorageManager {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self { store, prefix: prefix.into() }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    // -------------------------------------------------------------------------
    // KEYS
    // -------------------------------------------------------------------------

    fn current_key(&self) -> String {
        format!("{}:current", self.prefix)
    }

    fn index_key(&self) -> String {
        format!("{}:designs", self.prefix)
    }

    fn design_key(&self, id: &str) -> String {
        format!("{}:design:{id}", self.prefix)
    }

    fn auto_save_key(&self) -> String {
        format!("{}:auto-save-enabled", self.prefix)
    }

    fn owns_key(&self, key: &str) -> bool {
        key.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with(':'))
    }

    // -------------------------------------------------------------------------
    // RAW ACCESS
    // -------------------------------------------------------------------------

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "storage read failed");
                None
            }
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "malformed JSON in storage; treating as absent");
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::SaveFailed(e.to_string()))?;
        self.store.set(key, &raw)?;
        Ok(())
    }

    fn read_index(&self) -> Vec<DesignMetadata> {
        self.read_json(&self.index_key()).unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // CURRENT POINTER + AUTO-SAVE FLAG
    // -------------------------------------------------------------------------

    /// Id of the design auto-save writes to, if one is set.
    #[must_use]
    pub fn current_design_id(&self) -> Option<String> {
        self.read_raw(&self.current_key()).filter(|id| !id.is_empty())
    }

    /// Point auto-save at `id`.
    ///
    /// # Errors
    ///
    /// Returns the backend failure mapped to [`StorageError`].
    pub fn set_current_design_id(&self, id: &str) -> Result<(), StorageError> {
        self.store.set(&self.current_key(), id)?;
        Ok(())
    }

    fn clear_current_design_id(&self) -> Result<(), StoreError> {
        self.store.remove(&self.current_key())
    }

    /// Persisted auto-save toggle. Absent or unreadable means enabled.
    #[must_use]
    pub fn is_auto_save_enabled(&self) -> bool {
        self.read_raw(&self.auto_save_key()).is_none_or(|raw| raw != "false")
    }

    /// Persist the auto-save toggle.
    ///
    /// # Errors
    ///
    /// Returns the backend failure mapped to [`StorageError`].
    pub fn set_auto_save_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        self.store.set(&self.auto_save_key(), if enabled { "true" } else { "false" })?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // RECORDS
    // -------------------------------------------------------------------------

    /// Save `design` and mark it current.
    ///
    /// With `id`, the record is updated in place and keeps its original
    /// `createdAt`. Without one, a new id is generated.
    ///
    /// # Errors
    ///
    /// [`StorageError::QuotaExceeded`] when the store is full, otherwise
    /// [`StorageError::SaveFailed`].
    pub fn save_to_storage(&self, design: &DesignSystem, id: Option<&str>) -> Result<String, StorageError> {
        let saved = self.build_record(design, id);
        let id = saved.id.clone();
        self.write_record(&saved)?;
        self.set_current_design_id(&id)?;
        info!(id = %id, name = %saved.name, "design saved");
        Ok(id)
    }

    fn build_record(&self, design: &DesignSystem, id: Option<&str>) -> SavedDesign {
        let now = now_ms();
        let (id, created_at) = match id {
            Some(id) => {
                let created_at = self.get_design_by_id(id).map_or(now, |existing| existing.created_at);
                (id.to_owned(), created_at)
            }
            None => (generate_id(), now),
        };
        SavedDesign {
            id,
            name: design.name.clone(),
            data: design.clone(),
            created_at,
            updated_at: now,
        }
    }

    /// Write a record and its index entry as one unit.
    ///
    /// If the index write fails the record key is put back to its prior
    /// value (or removed) so the index never misses a stored record.
    fn write_record(&self, saved: &SavedDesign) -> Result<(), StorageError> {
        let key = self.design_key(&saved.id);
        let previous = self.store.get(&key)?;
        self.write_json(&key, saved)?;

        let mut index = self.read_index();
        let meta = DesignMetadata::from(saved);
        match index.iter_mut().find(|m| m.id == saved.id) {
            Some(existing) => *existing = meta,
            None => index.push(meta),
        }
        if let Err(e) = self.write_json(&self.index_key(), &index) {
            self.restore(&key, previous.as_deref());
            return Err(e);
        }
        Ok(())
    }

    /// Put `key` back to `previous`, removing it when there was none.
    fn restore(&self, key: &str, previous: Option<&str>) {
        let result = match previous {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        };
        match result {
            Ok(()) => warn!(key, "index write failed; record rolled back"),
            Err(e) => error!(key, error = %e, "record rollback failed; index out of step"),
        }
    }

    /// Load a design by id, or the current design when `id` is `None`.
    #[must_use]
    pub fn load_from_storage(&self, id: Option<&str>) -> Option<DesignSystem> {
        let id = match id {
            Some(id) => id.to_owned(),
            None => self.current_design_id()?,
        };
        let Some(saved) = self.get_design_by_id(&id) else {
            debug!(id = %id, "no stored design for id");
            return None;
        };
        Some(saved.data)
    }

    #[must_use]
    pub fn get_design_by_id(&self, id: &str) -> Option<SavedDesign> {
        self.read_json(&self.design_key(id))
    }

    #[must_use]
    pub fn get_designs_list(&self) -> Vec<DesignMetadata> {
        self.read_index()
    }

    /// Remove a record and its index entry. Deleting a missing id succeeds.
    pub fn delete_design(&self, id: &str) -> bool {
        match self.remove_record(id) {
            Ok(()) => {
                info!(id, "design deleted");
                true
            }
            Err(e) => {
                error!(id, error = %e, "design delete failed");
                false
            }
        }
    }

    fn remove_record(&self, id: &str) -> Result<(), StorageError> {
        let key = self.design_key(id);
        let previous = self.store.get(&key)?;
        self.store.remove(&key)?;

        let mut index = self.read_index();
        let before = index.len();
        index.retain(|m| m.id != id);
        if index.len() != before {
            if let Err(e) = self.write_json(&self.index_key(), &index) {
                self.restore(&key, previous.as_deref());
                return Err(e);
            }
        }

        if self.current_design_id().as_deref() == Some(id) {
            self.clear_current_design_id()?;
        }
        Ok(())
    }

    /// Clone a record under a new id with " (Copy)" appended to its name.
    ///
    /// The current pointer is left where it was.
    #[must_use]
    pub fn duplicate_design(&self, id: &str) -> Option<String> {
        let source = self.get_design_by_id(id)?;
        let name = format!("{}{COPY_SUFFIX}", source.name);
        let mut data = source.data;
        data.name.clone_from(&name);

        let now = now_ms();
        let copy = SavedDesign { id: generate_id(), name, data, created_at: now, updated_at: now };
        match self.write_record(&copy) {
            Ok(()) => {
                info!(source = id, id = %copy.id, "design duplicated");
                Some(copy.id)
            }
            Err(e) => {
                error!(source = id, error = %e, "design duplicate failed");
                None
            }
        }
    }

    /// Rename a record and its index entry.
    pub fn rename_design(&self, id: &str, new_name: &str) -> bool {
        let Some(mut saved) = self.get_design_by_id(id) else {
            return false;
        };
        new_name.clone_into(&mut saved.name);
        new_name.clone_into(&mut saved.data.name);
        saved.updated_at = now_ms();

        match self.write_record(&saved) {
            Ok(()) => true,
            Err(e) => {
                error!(id, error = %e, "design rename failed");
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // EXPORT / IMPORT
    // -------------------------------------------------------------------------

    /// Serialize a stored design inside a versioned export envelope.
    #[must_use]
    pub fn export_design_as_json(&self, id: &str) -> Option<String> {
        let saved = self.get_design_by_id(id)?;
        let envelope = ExportEnvelope {
            version: FORMAT_VERSION.to_owned(),
            exported_at: rfc3339_now(),
            design: saved.data,
        };
        match serde_json::to_string_pretty(&envelope) {
            Ok(json) => Some(json),
            Err(e) => {
                error!(id, error = %e, "design export failed");
                None
            }
        }
    }

    /// Parse an export envelope and save its design as a new record.
    ///
    /// # Errors
    ///
    /// [`StorageError::ImportInvalid`] for malformed JSON, a missing
    /// `design`, or a design lacking `colors` or `typography`. Save failures
    /// propagate as from [`Self::save_to_storage`].
    pub fn import_design_from_json(&self, json: &str) -> Result<String, StorageError> {
        let envelope: serde_json::Value =
            serde_json::from_str(json).map_err(|e| StorageError::ImportInvalid(format!("malformed JSON ({e})")))?;

        let Some(design) = envelope.get("design").filter(|d| d.is_object()) else {
            return Err(StorageError::ImportInvalid("missing design".to_owned()));
        };
        for field in ["colors", "typography"] {
            if design.get(field).is_none() {
                return Err(StorageError::ImportInvalid(format!("missing design.{field}")));
            }
        }

        let design: DesignSystem = serde_json::from_value(design.clone())
            .map_err(|e| StorageError::ImportInvalid(format!("unexpected design shape ({e})")))?;
        self.save_to_storage(&design, None)
    }

    // -------------------------------------------------------------------------
    // HOUSEKEEPING
    // -------------------------------------------------------------------------

    /// Remove every key under the prefix.
    pub fn clear_all_data(&self) {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                error!(error = %e, "could not list storage keys");
                return;
            }
        };
        let mut removed = 0usize;
        for key in keys.iter().filter(|k| self.owns_key(k)) {
            match self.store.remove(key) {
                Ok(()) => removed += 1,
                Err(e) => error!(key = %key, error = %e, "storage remove failed"),
            }
        }
        info!(removed, prefix = %self.prefix, "storage cleared");
    }

    /// Estimate usage from the byte length of every prefixed key and value.
    #[must_use]
    pub fn get_storage_info(&self) -> StorageInfo {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "could not list storage keys");
                Vec::new()
            }
        };
        let used: usize = keys
            .iter()
            .filter(|k| self.owns_key(k))
            .map(|k| k.len() + self.read_raw(k).map_or(0, |v| v.len()))
            .sum();
        storage_info(used)
    }
}

fn storage_info(used: usize) -> StorageInfo {
    #[allow(clippy::cast_precision_loss)]
    let percentage = used as f64 / STORAGE_QUOTA_BYTES as f64 * 100.0;
    StorageInfo {
        used,
        available: STORAGE_QUOTA_BYTES.saturating_sub(used),
        total: STORAGE_QUOTA_BYTES,
        percentage,
    }
}

/// `design_<ms>_<9 base36 chars>`.
fn generate_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_RANDOM_LEN)
        .map(|_| char::from(ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())]))
        .collect();
    format!("{ID_PREFIX}_{}_{suffix}", now_ms())
}

fn rfc3339_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| now_ms().to_string())
}

/// File name used when writing an export to disk.
#[must_use]
pub fn export_file_name(id: &str) -> String {
    format!("design-system-{id}.json")
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
