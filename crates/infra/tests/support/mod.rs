//! Shared test support: scripted partner client and a collecting event sink.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use roamsync_core::error::{PartnerError, PartnerResult};
use roamsync_core::{AdapterEvent, EventSink, PartnerClient};
use roamsync_domain::{
    AdapterConfig, BatchOutcome, ChargeRecord, DataPushMode, EvseAvailability, EvseBusyStatus,
    EvseId, ItemOutcome, PartnerConfig, PartnerOutcome, SyncSettings,
};
use uuid::Uuid;

/// One remote call observed by the mock client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartnerCall {
    DataPush {
        mode: DataPushMode,
        entities: Vec<String>,
    },
    BusyStatus {
        evse: String,
        status: EvseBusyStatus,
    },
    AvailabilityStatus {
        evse: String,
        status: EvseAvailability,
    },
    Heartbeat {
        partner_id: String,
    },
    ChargeRecord {
        session_id: String,
    },
}

/// Scripted in-memory partner.
///
/// Accepts everything by default; individual items can be marked rejected
/// (retryable) or invalid (terminal), and the whole partner can be taken
/// offline.
#[derive(Default)]
pub struct MockPartnerClient {
    calls: Mutex<Vec<PartnerCall>>,
    rejected_items: Mutex<HashSet<String>>,
    invalid_items: Mutex<HashSet<String>>,
    offline: AtomicBool,
}

impl MockPartnerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// The partner refuses this item (EVSE id or session id). Retryable.
    pub fn reject_item(&self, item: impl Into<String>) {
        self.rejected_items.lock().insert(item.into());
    }

    /// This item fails conversion at the client. Terminal.
    pub fn invalidate_item(&self, item: impl Into<String>) {
        self.invalid_items.lock().insert(item.into());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PartnerCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn check_online(&self) -> PartnerResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(PartnerError::Network("partner unreachable".into()))
        } else {
            Ok(())
        }
    }

    fn single_outcome(&self, item: &str) -> PartnerResult<PartnerOutcome> {
        if self.invalid_items.lock().contains(item) {
            return Err(PartnerError::Conversion(format!("unmappable item: {item}")));
        }
        if self.rejected_items.lock().contains(item) {
            return Ok(PartnerOutcome::rejected("REFUSED", format!("item {item} refused")));
        }
        Ok(PartnerOutcome::accepted())
    }
}

#[async_trait]
impl PartnerClient for MockPartnerClient {
    async fn set_availability_status(
        &self,
        evse: &EvseId,
        _recorded_at: DateTime<Utc>,
        status: &EvseAvailability,
    ) -> PartnerResult<PartnerOutcome> {
        self.check_online()?;
        self.calls.lock().push(PartnerCall::AvailabilityStatus {
            evse: evse.to_string(),
            status: status.clone(),
        });
        self.single_outcome(evse.as_str())
    }

    async fn set_busy_status(
        &self,
        evse: &EvseId,
        _recorded_at: DateTime<Utc>,
        status: &EvseBusyStatus,
    ) -> PartnerResult<PartnerOutcome> {
        self.check_online()?;
        self.calls.lock().push(PartnerCall::BusyStatus {
            evse: evse.to_string(),
            status: status.clone(),
        });
        self.single_outcome(evse.as_str())
    }

    async fn send_heartbeat(
        &self,
        partner_id: &str,
        _correlation_id: Uuid,
    ) -> PartnerResult<PartnerOutcome> {
        self.check_online()?;
        self.calls.lock().push(PartnerCall::Heartbeat {
            partner_id: partner_id.to_owned(),
        });
        Ok(PartnerOutcome::accepted())
    }

    async fn send_charge_record(&self, record: &ChargeRecord) -> PartnerResult<PartnerOutcome> {
        if self.invalid_items.lock().contains(record.session_id.as_str()) {
            return Err(PartnerError::Conversion(format!(
                "unmappable record: {}",
                record.session_id
            )));
        }
        self.check_online()?;
        self.calls.lock().push(PartnerCall::ChargeRecord {
            session_id: record.session_id.clone(),
        });
        self.single_outcome(record.session_id.as_str())
    }

    async fn push_evse_data(
        &self,
        entities: &[EvseId],
        mode: DataPushMode,
    ) -> PartnerResult<BatchOutcome> {
        self.check_online()?;
        self.calls.lock().push(PartnerCall::DataPush {
            mode,
            entities: entities.iter().map(|e| e.to_string()).collect(),
        });

        let items = entities
            .iter()
            .map(|evse| {
                let id = evse.to_string();
                if self.invalid_items.lock().contains(&id) {
                    ItemOutcome::invalid(id, "unmappable item")
                } else if self.rejected_items.lock().contains(&id) {
                    ItemOutcome::rejected(id, "item refused")
                } else {
                    ItemOutcome::accepted(id)
                }
            })
            .collect();
        Ok(BatchOutcome::new(items))
    }
}

/// Event sink storing everything it receives.
#[derive(Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<AdapterEvent>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AdapterEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: AdapterEvent) {
        self.events.lock().push(event);
    }
}

/// Valid configuration with the stock intervals.
pub fn test_config() -> AdapterConfig {
    AdapterConfig {
        partner: PartnerConfig {
            base_url: "http://partner.test/api".into(),
            partner_id: "CPO-TEST".into(),
            operator_id: "DE*TST".into(),
            ..PartnerConfig::default()
        },
        sync: SyncSettings::default(),
    }
}
