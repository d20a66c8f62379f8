//! Adapter configuration structures
//!
//! All intervals are plain integer seconds so the structs map directly onto
//! environment variables and config files. Helper methods expose them as
//! [`Duration`] for the schedulers.

use crate::constants::{
    DEFAULT_FAST_STATUS_INTERVAL_SECS, DEFAULT_FLUSH_QUIET_INTERVAL_SECS,
    DEFAULT_HEARTBEAT_INTERVAL_SECS, DEFAULT_MAX_BATCH_SIZE, DEFAULT_RECORD_FLUSH_INTERVAL_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::errors::{Result, RoamsyncError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the roaming partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerConfig {
    /// Base URL of the partner API, e.g. `https://partner.example/api/v2`.
    pub base_url: String,
    /// Identifier this adapter authenticates as towards the partner.
    pub partner_id: String,
    /// Charge point operator the pushed entities belong to.
    pub operator_id: String,
    /// Bearer token attached to every request when set.
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    /// Upper bound on entities per wire request; larger batches are chunked.
    pub max_batch_size: usize,
}

impl Default for PartnerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            partner_id: String::new(),
            operator_id: String::new(),
            api_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl PartnerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Timing and toggle settings for the synchronization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Quiet period after the last data enqueue before a full flush fires.
    pub flush_quiet_interval_secs: u64,
    /// Quiet period for the fast status path.
    pub fast_status_interval_secs: u64,
    /// Fixed heartbeat rate.
    pub heartbeat_interval_secs: u64,
    /// Quiet period for the charge record outbox.
    pub record_flush_interval_secs: u64,
    pub heartbeat_enabled: bool,
    pub data_push_enabled: bool,
    pub status_push_enabled: bool,
    pub charge_record_push_enabled: bool,
    /// Re-enqueue items that failed with a retryable classification.
    pub retry_failed_pushes: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            flush_quiet_interval_secs: DEFAULT_FLUSH_QUIET_INTERVAL_SECS,
            fast_status_interval_secs: DEFAULT_FAST_STATUS_INTERVAL_SECS,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            record_flush_interval_secs: DEFAULT_RECORD_FLUSH_INTERVAL_SECS,
            heartbeat_enabled: true,
            data_push_enabled: true,
            status_push_enabled: true,
            charge_record_push_enabled: true,
            retry_failed_pushes: true,
        }
    }
}

impl SyncSettings {
    pub fn flush_quiet_interval(&self) -> Duration {
        Duration::from_secs(self.flush_quiet_interval_secs)
    }

    pub fn fast_status_interval(&self) -> Duration {
        Duration::from_secs(self.fast_status_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn record_flush_interval(&self) -> Duration {
        Duration::from_secs(self.record_flush_interval_secs)
    }
}

/// Complete adapter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub partner: PartnerConfig,
    pub sync: SyncSettings,
}

impl AdapterConfig {
    /// Checks the configuration is internally usable. Called once at adapter
    /// construction; runtime code may assume a validated config.
    pub fn validate(&self) -> Result<()> {
        if self.partner.base_url.trim().is_empty() {
            return Err(RoamsyncError::Config("partner.base_url is empty".into()));
        }
        if !self.partner.base_url.starts_with("http://")
            && !self.partner.base_url.starts_with("https://")
        {
            return Err(RoamsyncError::Config(format!(
                "partner.base_url must be http(s): {}",
                self.partner.base_url
            )));
        }
        if self.partner.partner_id.trim().is_empty() {
            return Err(RoamsyncError::Config("partner.partner_id is empty".into()));
        }
        if self.partner.operator_id.trim().is_empty() {
            return Err(RoamsyncError::Config("partner.operator_id is empty".into()));
        }
        if self.partner.request_timeout_secs == 0 {
            return Err(RoamsyncError::Config(
                "partner.request_timeout_secs must be positive".into(),
            ));
        }
        if self.partner.max_batch_size == 0 {
            return Err(RoamsyncError::Config(
                "partner.max_batch_size must be positive".into(),
            ));
        }

        let intervals = [
            ("sync.flush_quiet_interval_secs", self.sync.flush_quiet_interval_secs),
            ("sync.fast_status_interval_secs", self.sync.fast_status_interval_secs),
            ("sync.heartbeat_interval_secs", self.sync.heartbeat_interval_secs),
            ("sync.record_flush_interval_secs", self.sync.record_flush_interval_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(RoamsyncError::Config(format!("{name} must be positive")));
            }
        }

        Ok(())
    }
}
