//! Core domain models for Species Filter
//!
//! This crate contains the shared data structures used across
//! the workspace: Filter, Observation, Species, and the Predicate
//! derived from a filter's criteria.

pub mod error;
pub mod models;
pub mod predicate;

pub use error::CoreError;
pub use models::*;
pub use predicate::{LocationClause, LocationField, Predicate};
