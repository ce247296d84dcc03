//! Saving, loading, and sharing design systems.
//!
//! The crate persists a [`design::DesignSystem`] three ways: as named records
//! in a key-value store, as a compressed `design` parameter in a shareable
//! URL, and automatically through a debounced coordinator that watches the
//! live [`state::DesignStore`].

pub mod backend;
pub mod config;
pub mod design;
pub mod services;
pub mod state;

pub use config::PersistenceConfig;
pub use design::{DesignMetadata, DesignSystem, SavedDesign};
pub use services::persistence::{InitOutcome, PersistenceCoordinator};
pub use services::storage::{StorageError, StorageManager};
pub use services::url_state::{UrlDecodeError, UrlEncodeError, UrlStateCodec};
pub use state::DesignStore;
