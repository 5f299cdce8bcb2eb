//! BDD Test Harness for filter application
//!
//! Run with: cargo test --test bdd -p species-filter-api
//!
//! Scenarios run in-process against the in-memory store.

use cucumber::{given, then, when, World};
use species_filter_applier::{ApplyError, RuleApplier};
use species_filter_core::{Filter, Observation, Species};
use species_filter_storage::{InMemoryStorage, ObservationStorage, SpeciesStorage};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// World state shared across steps
#[derive(World)]
#[world(init = Self::new)]
pub struct FilterWorld {
    storage: Arc<InMemoryStorage>,

    /// Observation label -> ID mapping
    observations: HashMap<String, Uuid>,

    /// Filter under test
    filter: Option<Filter>,

    /// Result of the last application
    last_result: Option<Result<usize, ApplyError>>,
}

impl FilterWorld {
    fn new() -> Self {
        Self {
            storage: Arc::new(InMemoryStorage::new()),
            observations: HashMap::new(),
            filter: None,
            last_result: None,
        }
    }

    fn filter_mut(&mut self) -> &mut Filter {
        self.filter.as_mut().expect("No filter defined. Create it first.")
    }
}

impl std::fmt::Debug for FilterWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterWorld")
            .field("observations", &self.observations)
            .field("filter", &self.filter)
            .field("last_result", &self.last_result)
            .finish()
    }
}

// ==================== GIVEN Steps ====================

#[given(expr = "the species {string} exists")]
async fn species_exists(world: &mut FilterWorld, code: String) {
    SpeciesStorage::save(world.storage.as_ref(), Species::new(&code, &code, &code))
        .await
        .expect("Failed to save species");
}

#[given(expr = "observation {string} of {string} in country {string} and state {string}")]
async fn observation_exists(
    world: &mut FilterWorld,
    label: String,
    species: String,
    country: String,
    state: String,
) {
    let observation = Observation::new(species, country, state, None, "L1");
    let saved = ObservationStorage::save(world.storage.as_ref(), observation)
        .await
        .expect("Failed to save observation");
    world.observations.insert(label, saved.id);
}

#[given(expr = "a filter replacing {string} with {string}")]
async fn filter_replacing(world: &mut FilterWorld, species: String, update_species: String) {
    world.filter = Some(Filter::new(
        format!("{} to {}", species, update_species),
        species,
        update_species,
    ));
}

#[given(expr = "a filter replacing {string} with {string} in country {string}")]
async fn filter_in_country(
    world: &mut FilterWorld,
    species: String,
    update_species: String,
    country: String,
) {
    filter_replacing(world, species, update_species).await;
    world.filter_mut().country = Some(country);
}

#[given(expr = "the filter is narrowed to state {string}")]
async fn filter_in_state(world: &mut FilterWorld, state: String) {
    world.filter_mut().state = Some(state);
}

#[given("the filter is disabled")]
async fn filter_disabled(world: &mut FilterWorld) {
    world.filter_mut().enabled = false;
}

// ==================== WHEN Steps ====================

#[when("I apply the filter")]
async fn apply_filter(world: &mut FilterWorld) {
    let filter = world.filter.clone().expect("No filter defined");
    let applier = RuleApplier::new(world.storage.clone());
    world.last_result = Some(applier.apply(&filter).await);
}

// ==================== THEN Steps ====================

#[then(regex = r"^(\d+) observations? (?:is|are) updated$")]
async fn observations_updated(world: &mut FilterWorld, expected: usize) {
    match world.last_result.as_ref().expect("Filter was not applied") {
        Ok(count) => assert_eq!(*count, expected, "Unexpected update count"),
        Err(e) => panic!("Apply failed: {}", e),
    }
}

#[then(expr = "observation {string} has species {string}")]
async fn observation_species(world: &mut FilterWorld, label: String, expected: String) {
    let id = world
        .observations
        .get(&label)
        .copied()
        .unwrap_or_else(|| panic!("Observation '{}' not found", label));
    let observation = ObservationStorage::get_by_id(world.storage.as_ref(), id)
        .await
        .expect("Failed to read observation")
        .expect("Observation disappeared");
    assert_eq!(observation.species, expected);
}

#[then("the filter is rejected as invalid")]
async fn filter_rejected(world: &mut FilterWorld) {
    match world.last_result.as_ref().expect("Filter was not applied") {
        Err(ApplyError::Validation(_)) => {}
        other => panic!("Expected a validation error, got {:?}", other),
    }
}

// ==================== Main ====================

#[tokio::main]
async fn main() {
    FilterWorld::run("tests/features").await;
}
