//! Error types for the core crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
}
