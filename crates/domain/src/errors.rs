//! Error types used throughout the adapter

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for roamsync
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum RoamsyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Partner error: {0}")]
    Partner(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for roamsync operations
pub type Result<T> = std::result::Result<T, RoamsyncError>;
