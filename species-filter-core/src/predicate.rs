//! Selection predicate derived from a filter
//!
//! A predicate is always `species == filter.species`, optionally joined with
//! exactly one location clause: the first of country, state, county and
//! location that is set on the filter.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Filter, Observation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationField {
    Country,
    State,
    County,
    Location,
}

impl LocationField {
    /// Field name as stored on an observation
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationField::Country => "country",
            LocationField::State => "state",
            LocationField::County => "county",
            LocationField::Location => "location",
        }
    }

    pub fn value_of<'a>(&self, observation: &'a Observation) -> Option<&'a str> {
        match self {
            LocationField::Country => Some(observation.country.as_str()),
            LocationField::State => Some(observation.state.as_str()),
            LocationField::County => observation.county.as_deref(),
            LocationField::Location => Some(observation.location.as_str()),
        }
    }
}

impl fmt::Display for LocationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationClause {
    pub field: LocationField,
    pub value: String,
}

/// Conjunctive equality predicate over observations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub species: String,
    pub location: Option<LocationClause>,
}

impl Predicate {
    /// Build the predicate for a filter. The `enabled` flag is not consulted.
    pub fn for_filter(filter: &Filter) -> Self {
        let location = filter
            .location_criteria()
            .into_iter()
            .find_map(|(field, value)| {
                value.map(|v| LocationClause {
                    field,
                    value: v.to_string(),
                })
            });

        Self {
            species: filter.species.clone(),
            location,
        }
    }

    pub fn matches(&self, observation: &Observation) -> bool {
        if observation.species != self.species {
            return false;
        }
        match &self.location {
            Some(clause) => clause.field.value_of(observation) == Some(clause.value.as_str()),
            None => true,
        }
    }

    /// Species-only predicates match every observation of the species.
    pub fn is_unscoped(&self) -> bool {
        self.location.is_none()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "species = '{}'", self.species)?;
        if let Some(clause) = &self.location {
            write!(f, " AND {} = '{}'", clause.field, clause.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn filter() -> Filter {
        Filter::new("test".into(), "amecro".into(), "fiscro".into())
    }

    fn observation(
        country: &str,
        state: &str,
        county: Option<&str>,
        location: &str,
    ) -> Observation {
        Observation::new("amecro", country, state, county.map(String::from), location)
    }

    #[test]
    fn test_species_only_predicate() {
        let predicate = Predicate::for_filter(&filter());
        assert!(predicate.is_unscoped());
        assert_eq!(predicate.to_string(), "species = 'amecro'");

        assert!(predicate.matches(&observation("US", "US-NY", None, "L1")));
        assert!(predicate.matches(&observation("CA", "CA-ON", Some("CA-ON-OT"), "L2")));
        assert!(!predicate.matches(&Observation::new("fiscro", "US", "US-NY", None, "L1")));
    }

    #[rstest]
    #[case::country_wins(
        Some("US"), Some("US-NY"), Some("US-NY-109"), Some("L1"), LocationField::Country, "US"
    )]
    #[case::state_over_county(
        None, Some("US-NY"), Some("US-NY-109"), Some("L1"), LocationField::State, "US-NY"
    )]
    #[case::county_over_location(
        None, None, Some("US-NY-109"), Some("L1"), LocationField::County, "US-NY-109"
    )]
    #[case::location_alone(None, None, None, Some("L1"), LocationField::Location, "L1")]
    fn test_location_precedence(
        #[case] country: Option<&str>,
        #[case] state: Option<&str>,
        #[case] county: Option<&str>,
        #[case] location: Option<&str>,
        #[case] field: LocationField,
        #[case] value: &str,
    ) {
        let mut filter = filter();
        filter.country = country.map(String::from);
        filter.state = state.map(String::from);
        filter.county = county.map(String::from);
        filter.location = location.map(String::from);

        let predicate = Predicate::for_filter(&filter);
        assert_eq!(
            predicate.location,
            Some(LocationClause {
                field,
                value: value.to_string()
            })
        );
    }

    #[test]
    fn test_lower_priority_fields_are_ignored() {
        let predicate = Predicate::for_filter(&filter().with_country("US").with_state("US-NY"));
        assert_eq!(predicate.to_string(), "species = 'amecro' AND country = 'US'");

        // Matches on country, not on state
        assert!(predicate.matches(&observation("US", "US-CA", None, "L1")));
        // Matches on state, not on country
        assert!(!predicate.matches(&observation("CA", "US-NY", None, "L1")));
    }

    #[test]
    fn test_county_clause_needs_a_county() {
        let predicate = Predicate::for_filter(&filter().with_county("US-NY-109"));
        assert!(predicate.matches(&observation("US", "US-NY", Some("US-NY-109"), "L1")));
        assert!(!predicate.matches(&observation("US", "US-NY", None, "L1")));
    }

    #[test]
    fn test_enabled_flag_is_not_consulted() {
        let enabled = filter().with_country("US");
        let disabled = enabled.clone().disabled();
        assert_eq!(Predicate::for_filter(&enabled), Predicate::for_filter(&disabled));
    }
}
