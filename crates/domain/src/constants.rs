//! Adapter constants
//!
//! Centralized location for all domain-level constants used throughout the
//! adapter.

// Scheduling defaults (seconds)
pub const DEFAULT_FLUSH_QUIET_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_FAST_STATUS_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_RECORD_FLUSH_INTERVAL_SECS: u64 = 60;

// Partner client defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

// Configuration loading
pub const ENV_PREFIX: &str = "ROAMSYNC_";
pub const CONFIG_FILE_CANDIDATES: &[&str] =
    &["roamsync.toml", "roamsync.json", "config.toml", "config.json"];

// Validation limits
pub const MAX_EVSE_ID_LENGTH: usize = 64;
pub const MAX_SESSION_ID_LENGTH: usize = 128;
