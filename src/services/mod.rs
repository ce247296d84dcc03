//! Persistence services.
//!
//! ARCHITECTURE
//! ============
//! `storage` and `url_state` are independent: each owns one host surface
//! (key-value store, page URL) and knows nothing of the other. `persistence`
//! is the only module that composes them with the live design store.

pub mod persistence;
pub mod storage;
pub mod url_state;
