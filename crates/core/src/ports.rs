//! Port interfaces for partner communication

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roamsync_domain::{
    BatchOutcome, ChargeRecord, DataPushMode, EvseAvailability, EvseBusyStatus, EvseId,
    PartnerOutcome,
};
use uuid::Uuid;

use crate::error::PartnerResult;

/// Trait for the roaming partner API.
///
/// Implementations own transport concerns (serialization, authentication,
/// per-request timeouts) and report completed exchanges as outcomes. An `Err`
/// return means the exchange itself failed; a partner that processed and
/// refused a request is an `Ok` outcome with `accepted == false`.
#[async_trait]
pub trait PartnerClient: Send + Sync {
    /// Push the administrative availability of one EVSE
    async fn set_availability_status(
        &self,
        evse: &EvseId,
        recorded_at: DateTime<Utc>,
        status: &EvseAvailability,
    ) -> PartnerResult<PartnerOutcome>;

    /// Push the occupancy state of one EVSE
    async fn set_busy_status(
        &self,
        evse: &EvseId,
        recorded_at: DateTime<Utc>,
        status: &EvseBusyStatus,
    ) -> PartnerResult<PartnerOutcome>;

    /// Signal adapter liveness to the partner
    async fn send_heartbeat(
        &self,
        partner_id: &str,
        correlation_id: Uuid,
    ) -> PartnerResult<PartnerOutcome>;

    /// Submit one finalized charge record
    async fn send_charge_record(&self, record: &ChargeRecord) -> PartnerResult<PartnerOutcome>;

    /// Push static entity data for a batch of EVSEs.
    ///
    /// Returns one outcome per input entity, in input order; conversion
    /// failures of single entities appear as `Invalid` items rather than
    /// failing the exchange.
    async fn push_evse_data(
        &self,
        entities: &[EvseId],
        mode: DataPushMode,
    ) -> PartnerResult<BatchOutcome>;
}
