//! Charge detail record types
//!
//! A charge record is immutable once created. Its delivery state is
//! positional: a record sitting in the outbox is pending, a record removed
//! after acknowledgement is sent, and a record dropped after a conversion
//! failure is terminally failed and only reported.

use crate::types::evse::EvseId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A finalized charging session ready for submission to the roaming partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRecord {
    /// Partner-visible session identifier, unique per charging session.
    pub session_id: String,
    pub evse: EvseId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Delivered energy in watt hours.
    pub energy_wh: u64,
    /// Authorization reference the session was started with, when known.
    pub auth_id: Option<String>,
}

impl ChargeRecord {
    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }
}
