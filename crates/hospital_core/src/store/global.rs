//! Lazily-initialized process-wide store handle.
//!
//! # Invariants
//! - The handle is created at most once per process.
//! - Callers treat an initialization error as fatal; nothing here retries.

use super::{DocumentStore, StoreError, StoreResult};
use crate::config::StoreConfig;
use once_cell::sync::OnceCell;

static STORE: OnceCell<DocumentStore> = OnceCell::new();

/// Returns the process store, creating it from environment configuration on
/// first use.
pub fn get_store() -> StoreResult<&'static DocumentStore> {
    STORE.get_or_try_init(|| DocumentStore::open(StoreConfig::from_env()))
}

/// Installs the process store with an explicit configuration.
///
/// Repeating the call with the same configuration returns the existing
/// handle; a different configuration is rejected.
pub fn init_store(config: StoreConfig) -> StoreResult<&'static DocumentStore> {
    let store = STORE.get_or_try_init(|| DocumentStore::open(config.clone()))?;
    if store.config() != &config {
        return Err(StoreError::AlreadyInitialized {
            active: store.config().location.to_string(),
            requested: config.location.to_string(),
        });
    }
    Ok(store)
}
