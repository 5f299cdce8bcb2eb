//! Applies species filters to stored observations
//!
//! A filter is turned into a predicate, every matching observation is
//! reassigned to the filter's replacement species and written back one
//! record at a time. Application is not transactional unless
//! [`ApplyMode::AllOrNothing`] is requested.

pub mod applier;
pub mod error;

pub use applier::{ApplyMode, RuleApplier};
pub use error::ApplyError;
