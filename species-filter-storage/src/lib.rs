//! Storage layer for Species Filter
//!
//! Provides persistence for filters, observations and the species
//! they refer to. Supports both in-memory (for development and tests)
//! and Couchbase backends.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "couchbase")]
pub mod couchbase;

pub use error::StorageError;
pub use memory::InMemoryStorage;
pub use traits::{FilterStorage, ObservationStorage, ObservationStream, SpeciesStorage};

#[cfg(feature = "couchbase")]
pub use couchbase::{CouchbaseConfig, CouchbaseStorage};

/// Unified storage trait
#[async_trait::async_trait]
pub trait Storage: FilterStorage + ObservationStorage + SpeciesStorage + Send + Sync {}

#[async_trait::async_trait]
impl<T> Storage for T where T: FilterStorage + ObservationStorage + SpeciesStorage + Send + Sync {}
