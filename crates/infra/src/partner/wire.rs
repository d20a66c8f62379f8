//! JSON wire layer for the partner API
//!
//! Mechanical DTO structs plus the conversions that can fail. Conversion
//! failures surface as [`PartnerError::Conversion`] and mark the affected
//! item terminally failed; nothing here touches the network.

use chrono::{DateTime, Utc};
use roamsync_core::error::PartnerError;
use roamsync_domain::constants::{MAX_EVSE_ID_LENGTH, MAX_SESSION_ID_LENGTH};
use roamsync_domain::{
    ChargeRecord, DataPushMode, EvseAvailability, EvseBusyStatus, EvseId, PartnerOutcome,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validate an entity id for transmission.
///
/// The engine treats ids as opaque; length and emptiness are checked only
/// here, at the wire boundary.
pub fn wire_evse_id(evse: &EvseId) -> Result<String, PartnerError> {
    let id = evse.as_str().trim();
    if id.is_empty() {
        return Err(PartnerError::Conversion("EVSE id is empty".into()));
    }
    if id.len() > MAX_EVSE_ID_LENGTH {
        return Err(PartnerError::Conversion(format!(
            "EVSE id exceeds {MAX_EVSE_ID_LENGTH} characters: {id}"
        )));
    }
    Ok(id.to_owned())
}

/// Batch data push request body.
#[derive(Debug, Clone, Serialize)]
pub struct PushDataRequest {
    pub operator_id: String,
    pub action: DataPushMode,
    pub evse_ids: Vec<String>,
}

/// Per-entity entry in a batch data push response.
#[derive(Debug, Clone, Deserialize)]
pub struct EvseResult {
    pub evse_id: String,
    #[serde(flatten)]
    pub response: PartnerResponse,
}

/// Batch data push response body.
///
/// Entities absent from `results` were accepted; partners typically echo
/// only the problematic subset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushDataResponse {
    #[serde(default)]
    pub results: Vec<EvseResult>,
}

/// Busy status push request body.
#[derive(Debug, Clone, Serialize)]
pub struct BusyStatusRequest {
    pub evse_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: EvseBusyStatus,
}

/// Availability status push request body.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityStatusRequest {
    pub evse_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: EvseAvailability,
}

/// Heartbeat request body.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    pub partner_id: String,
    pub correlation_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

/// Charge record submission body.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRecordRequest {
    pub session_id: String,
    pub evse_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub energy_wh: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<String>,
}

impl TryFrom<&ChargeRecord> for ChargeRecordRequest {
    type Error = PartnerError;

    fn try_from(record: &ChargeRecord) -> Result<Self, Self::Error> {
        let session_id = record.session_id.trim();
        if session_id.is_empty() {
            return Err(PartnerError::Conversion("charge record session id is empty".into()));
        }
        if session_id.len() > MAX_SESSION_ID_LENGTH {
            return Err(PartnerError::Conversion(format!(
                "session id exceeds {MAX_SESSION_ID_LENGTH} characters: {session_id}"
            )));
        }
        if record.ended_at < record.started_at {
            return Err(PartnerError::Conversion(format!(
                "charge record {session_id} ends before it starts"
            )));
        }
        Ok(Self {
            session_id: session_id.to_owned(),
            evse_id: wire_evse_id(&record.evse)?,
            started_at: record.started_at,
            ended_at: record.ended_at,
            energy_wh: record.energy_wh,
            auth_id: record.auth_id.clone(),
        })
    }
}

/// Acceptance marker in partner responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Accepted,
    Rejected,
}

/// Common partner response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct PartnerResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl PartnerResponse {
    pub fn into_outcome(self) -> PartnerOutcome {
        PartnerOutcome {
            accepted: self.status == ResponseStatus::Accepted,
            code: self.code,
            message: self.message,
            warnings: self.warnings,
        }
    }
}
