//! Active design state with change subscriptions.
//!
//! DESIGN
//! ======
//! `DesignStore` is the single holder of the design being edited. Editor
//! code mutates it; the persistence coordinator only reads snapshots and
//! listens for changes. Listeners run after the state lock is released, so
//! a listener may read the store (or even write it) without deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::design::{DesignSystem, now_ms};

/// Change callback. Receives the new snapshot.
pub type Listener = Arc<dyn Fn(&DesignSystem) + Send + Sync>;

type ListenerList = Mutex<Vec<(u64, Listener)>>;

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle returned by [`DesignStore::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl Subscription {
    /// Stop receiving changes. Returns `false` if already removed.
    pub fn unsubscribe(self) -> bool {
        let Some(listeners) = self.listeners.upgrade() else {
            return false;
        };
        let mut listeners = listeners.lock();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        listeners.len() != before
    }
}

// =============================================================================
// DESIGN STORE
// =============================================================================

pub struct DesignStore {
    design: RwLock<DesignSystem>,
    listeners: Arc<ListenerList>,
    next_id: AtomicU64,
}

impl DesignStore {
    #[must_use]
    pub fn new(initial: DesignSystem) -> Self {
        Self {
            design: RwLock::new(initial),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Snapshot of the active design.
    #[must_use]
    pub fn get(&self) -> DesignSystem {
        self.design.read().clone()
    }

    /// Replace the active design and notify listeners.
    pub fn set(&self, design: DesignSystem) {
        *self.design.write() = design.clone();
        self.notify(&design);
    }

    /// Edit the active design in place, stamp `updatedAt`, and notify.
    pub fn update(&self, edit: impl FnOnce(&mut DesignSystem)) {
        let snapshot = {
            let mut design = self.design.write();
            edit(&mut *design);
            design.updated_at = now_ms();
            design.clone()
        };
        self.notify(&snapshot);
    }

    /// Restore the built-in default design.
    pub fn reset(&self) {
        self.set(DesignSystem::default());
    }

    pub fn subscribe(&self, listener: impl Fn(&DesignSystem) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        self.listeners.lock().push((id, listener));
        Subscription { id, listeners: Arc::downgrade(&self.listeners) }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn notify(&self, design: &DesignSystem) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(design);
        }
    }
}

impl Default for DesignStore {
    fn default() -> Self {
        Self::new(DesignSystem::default())
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
