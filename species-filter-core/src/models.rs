//! Core domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::predicate::LocationField;
use crate::CoreError;

/// A correction rule: observations of `species`, optionally narrowed to a
/// region or site, are reassigned to `update_species`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Unique identifier
    pub id: Uuid,
    /// Is the filter active? Not consulted when a filter is applied directly.
    pub enabled: bool,
    /// Human-readable name, not unique
    pub name: String,
    /// Species code used to find matching observations
    pub species: String,
    /// Country code where the observation was made
    pub country: Option<String>,
    /// State (subnational1) code where the observation was made
    pub state: Option<String>,
    /// County (subnational2) code where the observation was made
    pub county: Option<String>,
    /// Location identifier used to find matching observations
    pub location: Option<String>,
    /// Matching observations are updated to this species code
    pub update_species: String,
    /// When the filter was created
    pub created: DateTime<Utc>,
    /// When the filter was last changed
    pub modified: DateTime<Utc>,
}

impl Filter {
    pub fn new(name: String, species: String, update_species: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            enabled: true,
            name,
            species,
            country: None,
            state: None,
            county: None,
            location: None,
            update_species,
            created: now,
            modified: now,
        }
    }

    pub fn with_country(mut self, code: impl Into<String>) -> Self {
        self.country = Some(code.into());
        self
    }

    pub fn with_state(mut self, code: impl Into<String>) -> Self {
        self.state = Some(code.into());
        self
    }

    pub fn with_county(mut self, code: impl Into<String>) -> Self {
        self.county = Some(code.into());
        self
    }

    pub fn with_location(mut self, id: impl Into<String>) -> Self {
        self.location = Some(id.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Location criteria in precedence order, broadest first.
    pub fn location_criteria(&self) -> [(LocationField, Option<&str>); 4] {
        [
            (LocationField::Country, self.country.as_deref()),
            (LocationField::State, self.state.as_deref()),
            (LocationField::County, self.county.as_deref()),
            (LocationField::Location, self.location.as_deref()),
        ]
    }

    /// A filter whose replacement species is the one it matches on.
    pub fn is_noop(&self) -> bool {
        self.species == self.update_species
    }

    /// Check that both species references are present
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.species.trim().is_empty() {
            return Err(CoreError::InvalidFilter(format!(
                "filter '{}' has no species to match",
                self.name
            )));
        }
        if self.update_species.trim().is_empty() {
            return Err(CoreError::InvalidFilter(format!(
                "filter '{}' has no species to update to",
                self.name
            )));
        }
        Ok(())
    }

    /// Replace the editable fields from a request, keeping identity and `created`.
    pub fn replace_with(&mut self, req: FilterRequest) {
        self.enabled = req.enabled;
        self.name = req.name;
        self.species = req.species;
        self.country = req.country;
        self.state = req.state;
        self.county = req.county;
        self.location = req.location;
        self.update_species = req.update_species;
        self.touch();
    }

    /// Mark the filter as modified now
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A single sighting, created by ingestion. Only `species` is ever rewritten here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub species: String,
    pub country: String,
    pub state: String,
    pub county: Option<String>,
    pub location: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Observation {
    pub fn new(
        species: impl Into<String>,
        country: impl Into<String>,
        state: impl Into<String>,
        county: Option<String>,
        location: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            species: species.into(),
            country: country.into(),
            state: state.into(),
            county,
            location: location.into(),
            created: now,
            modified: now,
        }
    }
}

/// Taxonomy entry that filters and observations refer to by code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub code: String,
    pub common_name: String,
    pub scientific_name: String,
}

impl Species {
    pub fn new(code: &str, common_name: &str, scientific_name: &str) -> Self {
        Self {
            code: code.to_string(),
            common_name: common_name.to_string(),
            scientific_name: scientific_name.to_string(),
        }
    }
}

/// An observation that could not be updated during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedUpdate {
    pub observation_id: Uuid,
    pub error: String,
}

/// Outcome of applying a filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub filter_id: Uuid,
    /// Observations selected by the filter's predicate
    pub matched: usize,
    /// Observations whose species was rewritten and persisted
    pub updated: usize,
    pub failed: Vec<FailedUpdate>,
    pub applied_at: DateTime<Utc>,
}

impl ApplyReport {
    pub fn new(filter_id: Uuid) -> Self {
        Self {
            filter_id,
            matched: 0,
            updated: 0,
            failed: Vec::new(),
            applied_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Request to create or replace a filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRequest {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub species: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub update_species: String,
}

fn default_enabled() -> bool {
    true
}

impl FilterRequest {
    pub fn into_filter(self) -> Filter {
        let mut filter = Filter::new(String::new(), String::new(), String::new());
        filter.replace_with(self);
        filter.modified = filter.created;
        filter
    }
}

/// Result of applying every enabled filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyAllResponse {
    pub reports: Vec<ApplyReport>,
    pub skipped: usize,
    pub updated: usize,
}
