use super::*;
use crate::backend::MemoryStore;
use std::sync::atomic::{AtomicBool, Ordering};

const PREFIX: &str = "design-system";

fn manager() -> (Arc<MemoryStore>, StorageManager) {
    let store = Arc::new(MemoryStore::new());
    let manager = StorageManager::new(store.clone(), PREFIX);
    (store, manager)
}

fn named(name: &str) -> DesignSystem {
    DesignSystem { name: name.to_owned(), ..DesignSystem::default() }
}

/// Every index entry must match a stored record, and vice versa.
fn assert_index_consistent(store: &MemoryStore, manager: &StorageManager) {
    let index = manager.get_designs_list();
    let record_prefix = format!("{PREFIX}:design:");
    let mut record_ids: Vec<String> = store
        .keys()
        .expect("keys")
        .into_iter()
        .filter_map(|k| k.strip_prefix(&record_prefix).map(str::to_owned))
        .collect();
    record_ids.sort();
    let mut index_ids: Vec<String> = index.iter().map(|m| m.id.clone()).collect();
    index_ids.sort();
    assert_eq!(index_ids, record_ids);

    for meta in &index {
        let saved = manager.get_design_by_id(&meta.id).expect("record for index entry");
        assert_eq!(DesignMetadata::from(&saved), *meta);
    }
}

/// Store whose writes always fail with an io error.
struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk on fire")))
    }

    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk on fire")))
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
}

/// Memory store whose index writes can be made to fail on demand.
#[derive(Default)]
struct FlakyIndexStore {
    inner: MemoryStore,
    fail_index: AtomicBool,
}

impl KeyValueStore for FlakyIndexStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key.ends_with(":designs") && self.fail_index.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("index write refused")));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.inner.keys()
    }
}

fn flaky_manager() -> (Arc<FlakyIndexStore>, StorageManager) {
    let store = Arc::new(FlakyIndexStore::default());
    let manager = StorageManager::new(store.clone(), PREFIX);
    (store, manager)
}

// =============================================================================
// save / load
// =============================================================================

#[test]
fn save_then_load_round_trips() {
    let (_store, manager) = manager();
    let design = named("Brand");
    let id = manager.save_to_storage(&design, None).expect("save");
    assert_eq!(manager.load_from_storage(Some(&id)), Some(design.clone()));
    assert_eq!(manager.load_from_storage(None), Some(design));
}

#[test]
fn save_generates_prefixed_id_and_marks_current() {
    let (_store, manager) = manager();
    let id = manager.save_to_storage(&named("A"), None).expect("save");
    let parts: Vec<&str> = id.split('_').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "design");
    assert!(parts[1].parse::<i64>().is_ok());
    assert_eq!(parts[2].len(), 9);
    assert_eq!(manager.current_design_id().as_deref(), Some(id.as_str()));
}

#[test]
fn generated_ids_are_unique() {
    let (_store, manager) = manager();
    let a = manager.save_to_storage(&named("A"), None).expect("save");
    let b = manager.save_to_storage(&named("B"), None).expect("save");
    assert_ne!(a, b);
    assert_eq!(manager.get_designs_list().len(), 2);
}

#[test]
fn save_with_id_updates_in_place_and_keeps_created_at() {
    let (store, manager) = manager();
    let id = manager.save_to_storage(&named("First"), None).expect("save");
    let created_at = manager.get_design_by_id(&id).expect("saved").created_at;

    std::thread::sleep(std::time::Duration::from_millis(5));
    let again = manager.save_to_storage(&named("Second"), Some(&id)).expect("update");
    assert_eq!(again, id);

    let saved = manager.get_design_by_id(&id).expect("saved");
    assert_eq!(saved.created_at, created_at);
    assert!(saved.updated_at >= created_at);
    assert_eq!(saved.name, "Second");
    assert_eq!(manager.get_designs_list().len(), 1);
    assert_index_consistent(&store, &manager);
}

#[test]
fn save_reports_quota_exceeded_distinctly() {
    let store = Arc::new(MemoryStore::with_quota(64));
    let manager = StorageManager::new(store, PREFIX);
    let err = manager.save_to_storage(&DesignSystem::default(), None).expect_err("quota");
    assert!(matches!(err, StorageError::QuotaExceeded));
    assert!(err.to_string().contains("export or delete"));
}

#[test]
fn save_reports_other_failures_as_save_failed() {
    let manager = StorageManager::new(Arc::new(BrokenStore), PREFIX);
    let err = manager.save_to_storage(&DesignSystem::default(), None).expect_err("broken");
    assert!(matches!(err, StorageError::SaveFailed(_)));
}

#[test]
fn save_rolls_back_record_when_index_does_not_fit() {
    // Same key and value lengths as the record the manager will write:
    // 30-char id, 13-digit timestamps.
    let design = named("Quota");
    let sized = SavedDesign {
        id: "design_0000000000000_000000000".to_owned(),
        name: design.name.clone(),
        data: design.clone(),
        created_at: 1_000_000_000_000,
        updated_at: 1_000_000_000_000,
    };
    let record_key = format!("{PREFIX}:design:{}", sized.id);
    let record_bytes =
        crate::backend::entry_bytes(&record_key, &serde_json::to_string(&sized).expect("serialize"));

    let store = Arc::new(MemoryStore::with_quota(record_bytes + 60));
    let manager = StorageManager::new(store.clone(), PREFIX);

    let err = manager.save_to_storage(&design, None).expect_err("index should not fit");
    assert!(matches!(err, StorageError::QuotaExceeded));
    assert!(store.is_empty(), "orphaned keys: {:?}", store.keys().expect("keys"));
    assert!(manager.get_designs_list().is_empty());
    assert_eq!(manager.current_design_id(), None);
}

#[test]
fn save_over_existing_restores_previous_record_on_index_failure() {
    let (store, manager) = flaky_manager();
    let id = manager.save_to_storage(&named("Before"), None).expect("save");
    let before = manager.get_design_by_id(&id).expect("record");

    store.fail_index.store(true, Ordering::SeqCst);
    let err = manager.save_to_storage(&named("After"), Some(&id)).expect_err("index refused");
    assert!(matches!(err, StorageError::SaveFailed(_)));

    assert_eq!(manager.get_design_by_id(&id), Some(before));
    assert_eq!(manager.get_designs_list()[0].name, "Before");
    assert_index_consistent(&store.inner, &manager);
}

#[test]
fn load_with_nothing_stored_is_none() {
    let (_store, manager) = manager();
    assert_eq!(manager.load_from_storage(None), None);
    assert_eq!(manager.load_from_storage(Some("design_0_missing")), None);
}

#[test]
fn load_with_stale_current_pointer_is_none() {
    let (store, manager) = manager();
    store.set("design-system:current", "design_1_gone").expect("set");
    assert_eq!(manager.load_from_storage(None), None);
}

#[test]
fn malformed_record_is_treated_as_absent() {
    let (store, manager) = manager();
    store.set("design-system:design:bad", "{not json").expect("set");
    store.set("design-system:designs", "[oops").expect("set");
    assert_eq!(manager.get_design_by_id("bad"), None);
    assert!(manager.get_designs_list().is_empty());
}

// =============================================================================
// delete / duplicate / rename
// =============================================================================

#[test]
fn delete_is_idempotent_and_clears_current() {
    let (store, manager) = manager();
    let keep = manager.save_to_storage(&named("Keep"), None).expect("save");
    let id = manager.save_to_storage(&named("Drop"), None).expect("save");

    assert!(manager.delete_design(&id));
    let after_first: Vec<String> = {
        let mut keys = store.keys().expect("keys");
        keys.sort();
        keys
    };
    assert!(manager.delete_design(&id));
    let after_second: Vec<String> = {
        let mut keys = store.keys().expect("keys");
        keys.sort();
        keys
    };

    assert_eq!(after_first, after_second);
    assert_eq!(manager.current_design_id(), None);
    assert_eq!(manager.get_designs_list().len(), 1);
    assert!(manager.get_design_by_id(&keep).is_some());
    assert_index_consistent(&store, &manager);
}

#[test]
fn delete_non_current_keeps_pointer() {
    let (_store, manager) = manager();
    let old = manager.save_to_storage(&named("Old"), None).expect("save");
    let current = manager.save_to_storage(&named("Current"), None).expect("save");
    assert!(manager.delete_design(&old));
    assert_eq!(manager.current_design_id().as_deref(), Some(current.as_str()));
}

#[test]
fn delete_reports_backend_failure() {
    let manager = StorageManager::new(Arc::new(BrokenStore), PREFIX);
    assert!(!manager.delete_design("anything"));
}

#[test]
fn duplicate_clones_under_new_id_with_copy_suffix() {
    let (store, manager) = manager();
    let id = manager.save_to_storage(&named("Brand"), None).expect("save");
    let copy = manager.duplicate_design(&id).expect("duplicate");
    assert_ne!(copy, id);

    let saved = manager.get_design_by_id(&copy).expect("copy stored");
    assert_eq!(saved.name, "Brand (Copy)");
    assert_eq!(saved.data.name, "Brand (Copy)");
    assert_eq!(saved.data.colors, DesignSystem::default().colors);
    assert_eq!(manager.current_design_id().as_deref(), Some(id.as_str()));
    assert_index_consistent(&store, &manager);
}

#[test]
fn duplicate_missing_source_is_none() {
    let (_store, manager) = manager();
    assert_eq!(manager.duplicate_design("design_0_missing"), None);
}

#[test]
fn rename_updates_record_and_index() {
    let (store, manager) = manager();
    let id = manager.save_to_storage(&named("Before"), None).expect("save");
    assert!(manager.rename_design(&id, "After"));

    let saved = manager.get_design_by_id(&id).expect("saved");
    assert_eq!(saved.name, "After");
    assert_eq!(saved.data.name, "After");
    assert_eq!(manager.get_designs_list()[0].name, "After");
    assert_index_consistent(&store, &manager);
}

#[test]
fn rename_missing_is_false() {
    let (_store, manager) = manager();
    assert!(!manager.rename_design("design_0_missing", "x"));
}

#[test]
fn failed_index_write_leaves_records_and_index_in_step() {
    let (store, manager) = flaky_manager();
    let id = manager.save_to_storage(&named("Original"), None).expect("save");
    store.fail_index.store(true, Ordering::SeqCst);

    assert!(!manager.rename_design(&id, "Renamed"));
    assert_eq!(manager.get_design_by_id(&id).map(|d| d.name).as_deref(), Some("Original"));

    assert_eq!(manager.duplicate_design(&id), None);

    assert!(!manager.delete_design(&id));
    assert!(manager.get_design_by_id(&id).is_some());
    assert_eq!(manager.current_design_id().as_deref(), Some(id.as_str()));

    assert_eq!(manager.get_designs_list().len(), 1);
    assert_index_consistent(&store.inner, &manager);
}

#[test]
fn index_stays_consistent_across_mixed_operations() {
    let (store, manager) = manager();
    let a = manager.save_to_storage(&named("A"), None).expect("save");
    let b = manager.save_to_storage(&named("B"), None).expect("save");
    let c = manager.duplicate_design(&a).expect("duplicate");
    assert!(manager.rename_design(&b, "B2"));
    assert!(manager.delete_design(&a));
    manager.save_to_storage(&named("C2"), Some(&c)).expect("update");
    assert!(manager.delete_design("never-existed"));

    assert_eq!(manager.get_designs_list().len(), 2);
    assert_index_consistent(&store, &manager);
}

// =============================================================================
// export / import
// =============================================================================

#[test]
fn export_wraps_design_in_envelope() {
    let (_store, manager) = manager();
    let design = named("Export me");
    let id = manager.save_to_storage(&design, None).expect("save");
    let json = manager.export_design_as_json(&id).expect("export");

    let envelope: ExportEnvelope = serde_json::from_str(&json).expect("envelope");
    assert_eq!(envelope.version, "1.0");
    assert!(!envelope.exported_at.is_empty());
    assert_eq!(envelope.design, design);
}

#[test]
fn export_missing_is_none() {
    let (_store, manager) = manager();
    assert_eq!(manager.export_design_as_json("design_0_missing"), None);
}

#[test]
fn export_then_import_creates_equal_copy() {
    let (_store, manager) = manager();
    let design = named("Round trip");
    let id = manager.save_to_storage(&design, None).expect("save");
    let json = manager.export_design_as_json(&id).expect("export");
    let imported = manager.import_design_from_json(&json).expect("import");
    assert_ne!(imported, id);
    assert_eq!(manager.load_from_storage(Some(&imported)), Some(design));
}

#[test]
fn import_minimal_envelope_succeeds() {
    let (_store, manager) = manager();
    let id = manager
        .import_design_from_json(r#"{"design":{"colors":{},"typography":{}}}"#)
        .expect("import");
    assert!(manager.get_design_by_id(&id).is_some());
    assert_eq!(manager.current_design_id().as_deref(), Some(id.as_str()));
}

#[test]
fn import_keeps_fields_outside_the_known_schema() {
    let (_store, manager) = manager();
    let id = manager
        .import_design_from_json(r#"{"design":{"colors":{},"typography":{},"breakpoints":{"md":"768px"}}}"#)
        .expect("import");

    let exported: serde_json::Value =
        serde_json::from_str(&manager.export_design_as_json(&id).expect("export")).expect("json");
    assert_eq!(exported["design"]["breakpoints"]["md"], "768px");
}

#[test]
fn import_accepts_loosely_shaped_token_values() {
    let (_store, manager) = manager();
    let id = manager
        .import_design_from_json(
            r##"{"design":{"colors":{"primary":"#3b82f6"},"typography":{"fontWeight":{"bold":"700"}}}}"##,
        )
        .expect("import");

    let design = manager.load_from_storage(Some(&id)).expect("stored");
    assert_eq!(design.colors["primary"], "#3b82f6");
    assert_eq!(design.typography.font_weight["bold"], "700");
}

#[test]
fn import_without_envelope_is_invalid() {
    let (_store, manager) = manager();
    let err = manager.import_design_from_json(r#"{"notDesign":1}"#).expect_err("invalid");
    assert!(matches!(err, StorageError::ImportInvalid(_)));
    assert!(err.to_string().contains("Invalid design system JSON"));
}

#[test]
fn import_missing_required_fields_is_invalid() {
    let (_store, manager) = manager();
    let err = manager.import_design_from_json(r#"{"design":{"colors":{}}}"#).expect_err("invalid");
    assert!(err.to_string().contains("design.typography"));
    let err = manager.import_design_from_json(r#"{"design":{"typography":{}}}"#).expect_err("invalid");
    assert!(err.to_string().contains("design.colors"));
}

#[test]
fn import_malformed_json_is_invalid() {
    let (_store, manager) = manager();
    let err = manager.import_design_from_json("{design:").expect_err("invalid");
    assert!(matches!(err, StorageError::ImportInvalid(_)));
    assert!(manager.get_designs_list().is_empty());
}

#[test]
fn export_file_name_uses_id() {
    assert_eq!(export_file_name("design_1_abc"), "design-system-design_1_abc.json");
}

// =============================================================================
// housekeeping
// =============================================================================

#[test]
fn auto_save_flag_defaults_to_enabled_and_persists() {
    let (store, manager) = manager();
    assert!(manager.is_auto_save_enabled());
    manager.set_auto_save_enabled(false).expect("set");
    assert!(!manager.is_auto_save_enabled());
    assert_eq!(
        store.get("design-system:auto-save-enabled").expect("get").as_deref(),
        Some("false")
    );
    manager.set_auto_save_enabled(true).expect("set");
    assert!(manager.is_auto_save_enabled());
}

#[test]
fn clear_all_data_only_removes_prefixed_keys() {
    let (store, manager) = manager();
    manager.save_to_storage(&named("A"), None).expect("save");
    manager.set_auto_save_enabled(false).expect("set");
    store.set("other-app:thing", "keep").expect("set");
    store.set("design-systemish", "keep").expect("set");

    manager.clear_all_data();

    let mut keys = store.keys().expect("keys");
    keys.sort();
    assert_eq!(keys, vec!["design-systemish".to_owned(), "other-app:thing".to_owned()]);
    assert_eq!(manager.load_from_storage(None), None);
}

#[test]
fn storage_info_sums_prefixed_entries() {
    let (store, manager) = manager();
    store.set("design-system:current", "abc").expect("set");
    store.set("unrelated", "0123456789").expect("set");

    let info = manager.get_storage_info();
    assert_eq!(info.used, "design-system:current".len() + 3);
    assert_eq!(info.total, STORAGE_QUOTA_BYTES);
    assert_eq!(info.available, STORAGE_QUOTA_BYTES - info.used);
    assert!(info.percentage > 0.0 && info.percentage < 0.01);
}

#[test]
fn storage_info_empty_store_is_zero() {
    let (_store, manager) = manager();
    let info = manager.get_storage_info();
    assert_eq!(info.used, 0);
    assert!(info.percentage.abs() < f64::EPSILON);
}
