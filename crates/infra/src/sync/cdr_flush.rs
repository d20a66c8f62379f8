//! Charge record outbox flush job
//!
//! Drains the outbox in submission order and delivers record by record. A
//! record whose wire conversion fails is dropped and reported; a record whose
//! call failed for a retryable reason returns to the front of the outbox and
//! goes out with the next cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use roamsync_core::{
    flatten, item_from_partner, AdapterEvent, ChangeQueue, EventSink, PartnerClient,
};
use roamsync_domain::{ChargeRecord, ItemOutcome, PushResult, PushSource, SyncSettings};
use tracing::{debug, instrument, warn};

use crate::sync::debounce::{FlushFollowUp, FlushJob};

/// Flush job draining the charge record outbox.
pub struct ChargeRecordFlushJob {
    queue: Arc<ChangeQueue>,
    client: Arc<dyn PartnerClient>,
    events: Arc<dyn EventSink>,
    settings: SyncSettings,
    cycle: AtomicU64,
}

impl ChargeRecordFlushJob {
    pub fn new(
        queue: Arc<ChangeQueue>,
        client: Arc<dyn PartnerClient>,
        events: Arc<dyn EventSink>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            queue,
            client,
            events,
            settings,
            cycle: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl FlushJob for ChargeRecordFlushJob {
    #[instrument(skip(self))]
    async fn flush(&self) -> FlushFollowUp {
        let records = self.queue.drain_records();
        if records.is_empty() {
            return FlushFollowUp::Done;
        }

        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.emit(AdapterEvent::FlushStarted {
            source: PushSource::ChargeRecords,
            cycle,
        });

        if !self.settings.charge_record_push_enabled {
            self.events.emit(AdapterEvent::FlushFinished {
                source: PushSource::ChargeRecords,
                cycle,
                result: PushResult::admin_down(PushSource::ChargeRecords),
            });
            return FlushFollowUp::Done;
        }

        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(records.len());
        let mut undelivered: Vec<ChargeRecord> = Vec::new();

        for record in records {
            match self.client.send_charge_record(&record).await {
                Ok(outcome) => {
                    if !outcome.accepted {
                        undelivered.push(record.clone());
                    }
                    outcomes.push(item_from_partner(record.session_id.clone(), &outcome));
                }
                Err(err) if err.is_retryable() => {
                    undelivered.push(record.clone());
                    outcomes.push(ItemOutcome::failed(record.session_id.clone(), err.to_string()));
                }
                Err(err) => {
                    // Conversion failure: terminal, reported but never retried.
                    warn!(session = %record.session_id, error = %err, "charge record dropped");
                    outcomes.push(ItemOutcome::invalid(record.session_id.clone(), err.to_string()));
                }
            }
        }

        let runtime_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = flatten(PushSource::ChargeRecords, &outcomes, runtime_ms);
        debug!(cycle, result = %result.status, "charge record cycle completed");
        self.events.emit(AdapterEvent::FlushFinished {
            source: PushSource::ChargeRecords,
            cycle,
            result,
        });

        if undelivered.is_empty() {
            return FlushFollowUp::Done;
        }

        let count = undelivered.len();
        self.queue.restore_records(undelivered);
        self.events.emit(AdapterEvent::Warning {
            source: PushSource::ChargeRecords,
            message: format!("{count} charge records returned to the outbox for retry"),
        });
        FlushFollowUp::Rearm
    }
}
