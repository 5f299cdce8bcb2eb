//! In-memory storage implementation for development and testing

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use species_filter_core::{Filter, Observation, Predicate, Species};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use crate::{FilterStorage, ObservationStorage, ObservationStream, SpeciesStorage, StorageError};

/// In-memory storage for development and testing
///
/// Observation writes are checked against the species table, so an
/// observation can only refer to a species that has been saved.
pub struct InMemoryStorage {
    filters: RwLock<HashMap<Uuid, Filter>>,
    observations: RwLock<HashMap<Uuid, Observation>>,
    species: RwLock<HashMap<String, Species>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            filters: RwLock::new(HashMap::new()),
            observations: RwLock::new(HashMap::new()),
            species: RwLock::new(HashMap::new()),
        }
    }

    fn check_species(&self, code: &str) -> Result<(), StorageError> {
        let species = self.species.read().map_err(poisoned)?;
        if species.contains_key(code) {
            Ok(())
        } else {
            Err(StorageError::InvalidReference(format!(
                "Species '{}' does not exist",
                code
            )))
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Internal("storage lock poisoned".to_string())
}

#[async_trait]
impl FilterStorage for InMemoryStorage {
    async fn save(&self, filter: Filter) -> Result<Filter, StorageError> {
        let mut filters = self.filters.write().map_err(poisoned)?;
        if filters.contains_key(&filter.id) {
            return Err(StorageError::AlreadyExists(format!(
                "Filter with id {} already exists",
                filter.id
            )));
        }
        filters.insert(filter.id, filter.clone());
        Ok(filter)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Filter>, StorageError> {
        let filters = self.filters.read().map_err(poisoned)?;
        Ok(filters.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Filter>, StorageError> {
        let filters = self.filters.read().map_err(poisoned)?;
        let mut all: Vec<_> = filters.values().cloned().collect();
        all.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(all)
    }

    async fn update(&self, mut filter: Filter) -> Result<Filter, StorageError> {
        let mut filters = self.filters.write().map_err(poisoned)?;
        if filters.contains_key(&filter.id) {
            filter.touch();
            filters.insert(filter.id, filter.clone());
            Ok(filter)
        } else {
            Err(StorageError::NotFound(format!(
                "Filter with id {} not found",
                filter.id
            )))
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        let mut filters = self.filters.write().map_err(poisoned)?;
        if filters.remove(&id).is_some() {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!(
                "Filter with id {} not found",
                id
            )))
        }
    }
}

#[async_trait]
impl ObservationStorage for InMemoryStorage {
    async fn save(&self, observation: Observation) -> Result<Observation, StorageError> {
        self.check_species(&observation.species)?;
        let mut observations = self.observations.write().map_err(poisoned)?;
        observations.insert(observation.id, observation.clone());
        Ok(observation)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Observation>, StorageError> {
        let observations = self.observations.read().map_err(poisoned)?;
        Ok(observations.get(&id).cloned())
    }

    async fn find<'a>(
        &'a self,
        predicate: &Predicate,
    ) -> Result<ObservationStream<'a>, StorageError> {
        // Only ids are held; records are read as the stream is polled so
        // writes made by the consumer never contend with an open read lock.
        let ids: Vec<Uuid> = {
            let observations = self.observations.read().map_err(poisoned)?;
            observations
                .values()
                .filter(|o| predicate.matches(o))
                .map(|o| o.id)
                .collect()
        };

        // A record changed since selection is re-checked and skipped if it
        // no longer matches.
        let predicate = predicate.clone();
        let stream = stream::iter(ids).filter_map(move |id| {
            let next = match self.observations.read() {
                Ok(observations) => match observations.get(&id) {
                    Some(o) if predicate.matches(o) => Some(Ok(o.clone())),
                    Some(_) => {
                        tracing::debug!("Observation {} no longer matches {}", id, predicate);
                        None
                    }
                    None => None,
                },
                Err(e) => Some(Err(poisoned(e))),
            };
            async move { next }
        });

        Ok(stream.boxed())
    }

    async fn count(&self, predicate: &Predicate) -> Result<usize, StorageError> {
        let observations = self.observations.read().map_err(poisoned)?;
        Ok(observations.values().filter(|o| predicate.matches(o)).count())
    }

    async fn update(&self, mut observation: Observation) -> Result<Observation, StorageError> {
        self.check_species(&observation.species)?;
        let mut observations = self.observations.write().map_err(poisoned)?;
        if observations.contains_key(&observation.id) {
            observation.modified = Utc::now();
            observations.insert(observation.id, observation.clone());
            Ok(observation)
        } else {
            Err(StorageError::NotFound(format!(
                "Observation with id {} not found",
                observation.id
            )))
        }
    }
}

#[async_trait]
impl SpeciesStorage for InMemoryStorage {
    async fn save(&self, species: Species) -> Result<Species, StorageError> {
        let mut all = self.species.write().map_err(poisoned)?;
        all.insert(species.code.clone(), species.clone());
        Ok(species)
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Species>, StorageError> {
        let all = self.species.read().map_err(poisoned)?;
        Ok(all.get(code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn storage_with_species(codes: &[&str]) -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        for code in codes {
            SpeciesStorage::save(&storage, Species::new(code, code, code))
                .await
                .unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn test_save_and_get_filter() {
        let storage = InMemoryStorage::new();
        let filter = Filter::new("crows".to_string(), "amecro".to_string(), "fiscro".to_string());

        let saved = FilterStorage::save(&storage, filter.clone()).await.unwrap();
        assert_eq!(saved.name, "crows");

        let retrieved = FilterStorage::get_by_id(&storage, saved.id).await.unwrap().unwrap();
        assert_eq!(retrieved, filter);

        let duplicate = FilterStorage::save(&storage, filter).await;
        assert!(matches!(duplicate, Err(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_update_filter_stamps_modified() {
        let storage = InMemoryStorage::new();
        let filter = Filter::new("crows".to_string(), "amecro".to_string(), "fiscro".to_string());
        let saved = FilterStorage::save(&storage, filter).await.unwrap();

        let mut changed = saved.clone();
        changed.enabled = false;
        let updated = FilterStorage::update(&storage, changed).await.unwrap();
        assert!(!updated.enabled);
        assert!(updated.modified >= saved.modified);
        assert_eq!(updated.created, saved.created);

        FilterStorage::delete(&storage, saved.id).await.unwrap();
        let missing = FilterStorage::update(&storage, updated).await;
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_observation_requires_known_species() {
        let storage = storage_with_species(&["amecro"]).await;

        let ok = Observation::new("amecro", "US", "US-NY", None, "L1");
        ObservationStorage::save(&storage, ok.clone()).await.unwrap();

        let unknown = Observation::new("nosuch", "US", "US-NY", None, "L1");
        let result = ObservationStorage::save(&storage, unknown).await;
        assert!(matches!(result, Err(StorageError::InvalidReference(_))));

        let mut renamed = ok;
        renamed.species = "nosuch".to_string();
        let result = ObservationStorage::update(&storage, renamed).await;
        assert!(matches!(result, Err(StorageError::InvalidReference(_))));
    }

    #[tokio::test]
    async fn test_find_streams_matches() {
        let storage = storage_with_species(&["amecro", "fiscro"]).await;
        let o1 = Observation::new("amecro", "US", "US-NY", None, "L1");
        let o2 = Observation::new("amecro", "CA", "CA-ON", None, "L2");
        let o3 = Observation::new("fiscro", "US", "US-NY", None, "L3");
        for o in [&o1, &o2, &o3] {
            ObservationStorage::save(&storage, o.clone()).await.unwrap();
        }

        let filter =
            Filter::new("crows".into(), "amecro".into(), "fiscro".into()).with_country("US");
        let predicate = Predicate::for_filter(&filter);

        let found: Vec<Observation> = storage
            .find(&predicate)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(found, vec![o1.clone()]);
        assert_eq!(storage.count(&predicate).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_while_streaming() {
        let storage = storage_with_species(&["amecro", "fiscro"]).await;
        for i in 0..5 {
            let o = Observation::new("amecro", "US", "US-NY", None, format!("L{}", i));
            ObservationStorage::save(&storage, o).await.unwrap();
        }

        let predicate = Predicate::for_filter(&Filter::new(
            "crows".into(),
            "amecro".into(),
            "fiscro".into(),
        ));
        let mut matches = storage.find(&predicate).await.unwrap();
        let mut updated = 0;
        while let Some(mut observation) = matches.try_next().await.unwrap() {
            let before = observation.modified;
            observation.species = "fiscro".to_string();
            let saved = ObservationStorage::update(&storage, observation).await.unwrap();
            assert!(saved.modified >= before);
            updated += 1;
        }

        assert_eq!(updated, 5);
        assert_eq!(storage.count(&predicate).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_skips_record_changed_before_poll() {
        let storage = storage_with_species(&["amecro", "fiscro"]).await;
        let moved = Observation::new("amecro", "US", "US-NY", None, "L1");
        let kept = Observation::new("amecro", "US", "US-NY", None, "L2");
        ObservationStorage::save(&storage, moved.clone()).await.unwrap();
        ObservationStorage::save(&storage, kept.clone()).await.unwrap();

        let predicate = Predicate::for_filter(&Filter::new(
            "crows".into(),
            "amecro".into(),
            "fiscro".into(),
        ));
        let matches = storage.find(&predicate).await.unwrap();

        // Another writer reassigns one record after selection
        let mut changed = moved.clone();
        changed.species = "fiscro".to_string();
        ObservationStorage::update(&storage, changed).await.unwrap();

        let found: Vec<Observation> = matches.try_collect().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, kept.id);
        assert_eq!(found[0].species, "amecro");
    }
}
