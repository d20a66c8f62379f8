//! Partner API access: HTTP client and JSON wire layer.

pub mod client;
pub mod wire;

pub use client::HttpPartnerClient;
