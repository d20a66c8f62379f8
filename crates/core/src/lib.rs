//! # Roamsync Core
//!
//! Pure synchronization engine logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - The change queue with its coalescing rules and update logs
//! - Port/adapter interfaces (traits) for the partner client
//! - The result aggregator that flattens per-item outcomes
//! - Observability events emitted by the engine
//!
//! ## Architecture Principles
//! - Only depends on `roamsync-domain`
//! - No HTTP, timer, or runtime code
//! - All external dependencies via traits
//! - Pure, testable engine logic

pub mod aggregate;
pub mod error;
pub mod events;
pub mod ports;
pub mod queue;

// Re-export specific items to avoid ambiguity
pub use aggregate::{flatten, item_from_partner};
pub use error::{PartnerError, PartnerErrorCategory, PartnerResult};
pub use events::{AdapterEvent, ChangeClass, EventSink, NullEventSink};
pub use ports::PartnerClient;
pub use queue::{ChangeBatch, ChangeQueue, QueueDepths};
