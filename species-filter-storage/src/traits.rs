//! Storage traits defining the interface for persistence

use async_trait::async_trait;
use futures::stream::BoxStream;
use species_filter_core::{Filter, Observation, Predicate, Species};
use uuid::Uuid;

use crate::StorageError;

/// Matching observations, yielded one at a time
pub type ObservationStream<'a> = BoxStream<'a, Result<Observation, StorageError>>;

/// Trait for filter storage operations
#[async_trait]
pub trait FilterStorage: Send + Sync {
    /// Save a new filter
    async fn save(&self, filter: Filter) -> Result<Filter, StorageError>;

    /// Get a filter by ID
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Filter>, StorageError>;

    /// List all filters
    async fn list(&self) -> Result<Vec<Filter>, StorageError>;

    /// Update an existing filter, stamping its `modified` time
    async fn update(&self, filter: Filter) -> Result<Filter, StorageError>;

    /// Delete a filter
    async fn delete(&self, id: Uuid) -> Result<(), StorageError>;
}

/// Trait for observation storage operations
#[async_trait]
pub trait ObservationStorage: Send + Sync {
    /// Save a new observation
    async fn save(&self, observation: Observation) -> Result<Observation, StorageError>;

    /// Get an observation by ID
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Observation>, StorageError>;

    /// Stream every observation matching the predicate, in storage order
    async fn find<'a>(&'a self, predicate: &Predicate)
        -> Result<ObservationStream<'a>, StorageError>;

    /// Count observations matching the predicate
    async fn count(&self, predicate: &Predicate) -> Result<usize, StorageError>;

    /// Persist a changed observation, stamping its `modified` time
    async fn update(&self, observation: Observation) -> Result<Observation, StorageError>;
}

/// Trait for species reference data
#[async_trait]
pub trait SpeciesStorage: Send + Sync {
    /// Save or replace a species
    async fn save(&self, species: Species) -> Result<Species, StorageError>;

    /// Get a species by its code
    async fn get_by_code(&self, code: &str) -> Result<Option<Species>, StorageError>;
}
