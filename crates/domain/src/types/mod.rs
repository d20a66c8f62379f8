//! Domain types and models

pub mod evse;
pub mod outcome;
pub mod record;

use serde::{Deserialize, Serialize};

// Re-export entity and outcome types for convenience
pub use evse::{
    EvseAvailability, EvseBusyStatus, EvseId, FieldChange, StatusChange, StatusKind, StatusUpdate,
};
pub use outcome::{BatchOutcome, DataPushMode, ItemOutcome, ItemVerdict, PartnerOutcome};
pub use record::ChargeRecord;

/// How a submission travels to the partner.
///
/// `Enqueue` hands the item to the matching queue and returns immediately;
/// `Direct` bypasses every queue and timer and performs the remote call
/// synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionMode {
    Enqueue,
    Direct,
}
