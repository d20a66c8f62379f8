//! # Roamsync Domain
//!
//! Business domain types and models for the roaming adapter.
//!
//! This crate contains:
//! - Charge point entity types (EVSE ids, status values, charge records)
//! - Composite push results returned by every synchronization path
//! - Adapter configuration structures and validation
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other roamsync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod result;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use result::*;
pub use types::*;
