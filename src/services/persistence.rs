//! Persistence coordinator — startup load order and debounced auto-save.
//!
//! DESIGN
//! ======
//! Startup runs once: a design embedded in the page URL wins; otherwise the
//! current design from storage is adopted; otherwise the store keeps its
//! built-in default. A URL-sourced design is not written back to storage on
//! load, so opening a shared link never overwrites a saved design.
//!
//! After startup every store change feeds two debouncers that share one
//! delay but own separate timers: one saves to the current storage record,
//! the other mirrors the design into the URL with `replace_state`. Each
//! holds a single pending task carrying the latest snapshot; a new change
//! aborts it and starts over, so a burst of edits produces one write of
//! the final state.
//!
//! ERROR HANDLING
//! ==============
//! Debounced actions log failures and never retry. The next edit schedules
//! a fresh attempt.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PersistenceConfig;
use crate::design::DesignSystem;
use crate::services::storage::{StorageError, StorageManager};
use crate::services::url_state::{UrlDecodeError, UrlStateCodec};
use crate::state::{DesignStore, Subscription};

// =============================================================================
// DEBOUNCER
// =============================================================================

type Action<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Single-slot trailing debounce on a tokio runtime.
pub struct Debouncer<T> {
    delay: Duration,
    runtime: Handle,
    action: Action<T>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration, runtime: Handle, action: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self { delay, runtime, action: Arc::new(action), pending: Mutex::new(None) }
    }

    /// Run the action with `value` once `delay` passes without another call.
    pub fn schedule(&self, value: T) {
        let action = Arc::clone(&self.action);
        let delay = self.delay;
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            action(value);
        }));
    }

    /// Drop the pending call, if any. Returns whether one was waiting.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Where the active design came from at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Url,
    Storage,
    Default,
    AlreadyInitialized,
}

pub struct PersistenceCoordinator {
    store: Arc<DesignStore>,
    storage: Arc<StorageManager>,
    url_state: Arc<UrlStateCodec>,
    save: Arc<Debouncer<DesignSystem>>,
    url_sync: Arc<Debouncer<DesignSystem>>,
    initialized: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
}

impl PersistenceCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<DesignStore>,
        storage: Arc<StorageManager>,
        url_state: Arc<UrlStateCodec>,
        config: &PersistenceConfig,
        runtime: Handle,
    ) -> Self {
        let save = {
            let storage = Arc::clone(&storage);
            Debouncer::new(config.debounce, runtime.clone(), move |design: DesignSystem| {
                auto_save(&storage, &design);
            })
        };
        let url_sync = {
            let url_state = Arc::clone(&url_state);
            Debouncer::new(config.debounce, runtime, move |design: DesignSystem| {
                if !url_state.update_url(&design, true) {
                    debug!("design too large for URL; parameter cleared");
                }
            })
        };

        Self {
            store,
            storage,
            url_state,
            save: Arc::new(save),
            url_sync: Arc::new(url_sync),
            initialized: AtomicBool::new(false),
            subscription: Mutex::new(None),
        }
    }

    /// Load the initial design and start auto-saving. Runs at most once.
    pub fn initialize(&self) -> InitOutcome {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return InitOutcome::AlreadyInitialized;
        }
        let outcome = self.load_initial_design();
        self.subscribe();
        info!(?outcome, "persistence initialized");
        outcome
    }

    fn load_initial_design(&self) -> InitOutcome {
        match self.url_state.decode_url_to_design() {
            Ok(design) => {
                info!(name = %design.name, "adopting design from URL");
                self.store.set(design);
                return InitOutcome::Url;
            }
            Err(UrlDecodeError::NoParam) => {}
            Err(e) => {
                warn!(error = e.tag(), detail = %e, "shared design unreadable; falling back to storage");
            }
        }

        match self.storage.load_from_storage(None) {
            Some(design) => {
                info!(name = %design.name, "adopting current design from storage");
                self.store.set(design);
                InitOutcome::Storage
            }
            None => InitOutcome::Default,
        }
    }

    fn subscribe(&self) {
        let storage = Arc::clone(&self.storage);
        let save = Arc::clone(&self.save);
        let url_sync = Arc::clone(&self.url_sync);
        let subscription = self.store.subscribe(move |design| {
            if !storage.is_auto_save_enabled() {
                return;
            }
            save.schedule(design.clone());
            url_sync.schedule(design.clone());
        });
        *self.subscription.lock() = Some(subscription);
    }

    #[must_use]
    pub fn is_auto_save_enabled(&self) -> bool {
        self.storage.is_auto_save_enabled()
    }

    /// Persist the auto-save toggle. Turning it off also drops pending writes.
    ///
    /// # Errors
    ///
    /// Returns the storage failure if the flag could not be written.
    pub fn set_auto_save_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        self.storage.set_auto_save_enabled(enabled)?;
        if !enabled {
            self.cancel_pending();
        }
        info!(enabled, "auto-save toggled");
        Ok(())
    }

    /// Whether either debounced write is still waiting to fire.
    #[must_use]
    pub fn has_pending_writes(&self) -> bool {
        self.save.is_pending() || self.url_sync.is_pending()
    }

    fn cancel_pending(&self) {
        let dropped_save = self.save.cancel();
        let dropped_url = self.url_sync.cancel();
        if dropped_save || dropped_url {
            debug!(dropped_save, dropped_url, "pending writes cancelled");
        }
    }

    /// Stop listening to the store and drop pending writes.
    pub fn shutdown(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        self.cancel_pending();
    }

    #[must_use]
    pub fn store(&self) -> &Arc<DesignStore> {
        &self.store
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    #[must_use]
    pub fn url_state(&self) -> &Arc<UrlStateCodec> {
        &self.url_state
    }
}

fn auto_save(storage: &StorageManager, design: &DesignSystem) {
    let Some(id) = storage.current_design_id() else {
        debug!("no current design; auto-save skipped");
        return;
    };
    if let Err(e) = storage.save_to_storage(design, Some(&id)) {
        error!(id = %id, error = %e, "auto-save failed");
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
