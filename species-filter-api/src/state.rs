//! Application state shared across handlers

use species_filter_applier::RuleApplier;
use species_filter_storage::{FilterStorage, InMemoryStorage, ObservationStorage, Storage};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub filter_storage: Arc<dyn FilterStorage>,
    pub observation_storage: Arc<dyn ObservationStorage>,
    pub applier: RuleApplier,
}

impl AppState {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStorage::new());
        Self::with_storage(store)
    }

    /// Create with custom storage backend
    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        let observation_storage: Arc<dyn ObservationStorage> = storage.clone();

        Self {
            filter_storage: storage,
            applier: RuleApplier::new(observation_storage.clone()),
            observation_storage,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
