//! # Roamsync Infrastructure
//!
//! Infrastructure implementations of the core synchronization ports.
//!
//! This crate contains:
//! - The HTTP partner client (reqwest) with its JSON wire layer
//! - The debounced flush workers and the fixed-rate heartbeat scheduler
//! - The configuration loader (environment variables + config files)
//! - The [`adapter::RoamingAdapter`] facade tying everything together
//!
//! ## Architecture
//! - Implements traits defined in `roamsync-core`
//! - Contains all "impure" code (timers, HTTP, environment)

pub mod adapter;
pub mod config;
pub mod events;
pub mod partner;
pub mod sync;

// Re-export commonly used items
pub use adapter::RoamingAdapter;
pub use events::TracingEventSink;
pub use partner::HttpPartnerClient;
