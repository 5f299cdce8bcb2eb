//! Applier error types

use species_filter_core::CoreError;
use species_filter_storage::StorageError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Validation error: {0}")]
    Validation(#[from] CoreError),

    #[error("Invalid reference: {message}")]
    Reference {
        applied: usize,
        observation_id: Option<Uuid>,
        message: String,
    },

    #[error("Failed to persist observation {observation_id} after {applied} updates: {source}")]
    Persistence {
        applied: usize,
        observation_id: Uuid,
        #[source]
        source: StorageError,
    },

    #[error("Failed to read matching observations after {applied} updates: {source}")]
    Query {
        applied: usize,
        #[source]
        source: StorageError,
    },

    #[error("Rolled back {reverted} updates: {cause}")]
    RolledBack {
        reverted: usize,
        /// Observations whose original species could not be restored
        unreverted: Vec<Uuid>,
        cause: String,
    },
}

impl ApplyError {
    /// Error for a failed write of one observation
    pub(crate) fn write(applied: usize, observation_id: Uuid, err: StorageError) -> Self {
        match err {
            StorageError::InvalidReference(message) => ApplyError::Reference {
                applied,
                observation_id: Some(observation_id),
                message,
            },
            source => ApplyError::Persistence {
                applied,
                observation_id,
                source,
            },
        }
    }

    /// Error while selecting or streaming matches
    pub(crate) fn read(applied: usize, err: StorageError) -> Self {
        match err {
            StorageError::InvalidReference(message) => ApplyError::Reference {
                applied,
                observation_id: None,
                message,
            },
            source => ApplyError::Query { applied, source },
        }
    }

    /// Observations updated and left durable before the run stopped
    pub fn applied(&self) -> usize {
        match self {
            ApplyError::Reference { applied, .. }
            | ApplyError::Persistence { applied, .. }
            | ApplyError::Query { applied, .. } => *applied,
            ApplyError::Validation(_) => 0,
            ApplyError::RolledBack { unreverted, .. } => unreverted.len(),
        }
    }
}
