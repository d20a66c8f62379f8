//! Charge point entity types
//!
//! The adapter treats EVSE identifiers as opaque keys. Structural validation
//! (separators, roaming prefixes) happens only at the wire boundary when an
//! entity is converted for transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a single charging point (EVSE).
///
/// Comparable and hashable so it can key the pending change sets. The engine
/// never interprets its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvseId(String);

impl EvseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EvseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EvseId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for EvseId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Occupancy state of an EVSE as reported by the charging station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvseBusyStatus {
    Available,
    Busy,
    Reserved,
    OutOfOrder,
    Unknown,
}

/// Administrative availability of an EVSE from the operator's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvseAvailability {
    InService,
    OutOfService,
    Planned,
    Removed,
    Unknown,
}

/// Which of the two status families a status update belongs to.
///
/// Coalescing is last-write-wins per (entity, kind): a newer busy update
/// replaces an older busy update for the same EVSE but never touches a
/// pending availability update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Busy,
    Availability,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("busy"),
            Self::Availability => f.write_str("availability"),
        }
    }
}

/// Old and new value of a single status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusChange {
    Busy {
        old: EvseBusyStatus,
        new: EvseBusyStatus,
    },
    Availability {
        old: EvseAvailability,
        new: EvseAvailability,
    },
}

impl StatusChange {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Busy { .. } => StatusKind::Busy,
            Self::Availability { .. } => StatusKind::Availability,
        }
    }
}

/// A pending status notification for one EVSE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub evse: EvseId,
    pub change: StatusChange,
    pub recorded_at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn busy(
        evse: EvseId,
        old: EvseBusyStatus,
        new: EvseBusyStatus,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            evse,
            change: StatusChange::Busy { old, new },
            recorded_at,
        }
    }

    pub fn availability(
        evse: EvseId,
        old: EvseAvailability,
        new: EvseAvailability,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            evse,
            change: StatusChange::Availability { old, new },
            recorded_at,
        }
    }

    pub fn kind(&self) -> StatusKind {
        self.change.kind()
    }
}

/// One recorded field-level change for the property update log.
///
/// Values are kept in display form; the log exists for diagnostics and flush
/// snapshots, not for reconstructing entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

impl FieldChange {
    pub fn new(
        field: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evse_id_is_opaque_and_comparable() {
        let a = EvseId::new("DE*ABC*E1234*1");
        let b = EvseId::from("DE*ABC*E1234*1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "DE*ABC*E1234*1");
        assert_eq!(a.to_string(), "DE*ABC*E1234*1");
    }

    #[test]
    fn status_change_reports_its_kind() {
        let busy = StatusChange::Busy {
            old: EvseBusyStatus::Available,
            new: EvseBusyStatus::Busy,
        };
        let avail = StatusChange::Availability {
            old: EvseAvailability::InService,
            new: EvseAvailability::OutOfService,
        };
        assert_eq!(busy.kind(), StatusKind::Busy);
        assert_eq!(avail.kind(), StatusKind::Availability);
    }

    #[test]
    fn status_update_constructors_populate_change() {
        let now = Utc::now();
        let update = StatusUpdate::busy(
            EvseId::new("E1"),
            EvseBusyStatus::Available,
            EvseBusyStatus::Reserved,
            now,
        );
        assert_eq!(update.kind(), StatusKind::Busy);
        assert_eq!(update.recorded_at, now);
        match update.change {
            StatusChange::Busy { new, .. } => assert_eq!(new, EvseBusyStatus::Reserved),
            other => panic!("unexpected change: {other:?}"),
        }
    }
}
