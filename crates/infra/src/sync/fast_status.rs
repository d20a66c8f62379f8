//! Fast-status flush job
//!
//! Runs on a shorter quiet interval than the full flush so occupancy changes
//! reach the partner within seconds. Entities still awaiting creation are
//! partitioned out at drain time and ride with the next full flush instead;
//! the partner rejects status-only updates for entities it does not know.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use roamsync_core::{
    flatten, item_from_partner, AdapterEvent, ChangeQueue, EventSink, PartnerClient,
};
use roamsync_domain::{ItemOutcome, PushResult, PushSource, StatusChange, StatusUpdate, SyncSettings};
use tracing::{debug, instrument};

use crate::sync::debounce::{ArmHandle, FlushFollowUp, FlushJob};

/// Flush job for the latency-sensitive status path.
pub struct FastStatusJob {
    queue: Arc<ChangeQueue>,
    client: Arc<dyn PartnerClient>,
    events: Arc<dyn EventSink>,
    settings: SyncSettings,
    /// Arms the full flush when failed tuples are parked on the delayed list.
    data_flush: ArmHandle,
    cycle: AtomicU64,
}

impl FastStatusJob {
    pub fn new(
        queue: Arc<ChangeQueue>,
        client: Arc<dyn PartnerClient>,
        events: Arc<dyn EventSink>,
        settings: SyncSettings,
        data_flush: ArmHandle,
    ) -> Self {
        Self {
            queue,
            client,
            events,
            settings,
            data_flush,
            cycle: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl FlushJob for FastStatusJob {
    #[instrument(skip(self))]
    async fn flush(&self) -> FlushFollowUp {
        // Tuples for entities still in to_add move to the delayed list here
        // and are not part of the drain result.
        let statuses = self.queue.drain_fast_status();
        if statuses.is_empty() {
            return FlushFollowUp::Done;
        }

        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.emit(AdapterEvent::FlushStarted {
            source: PushSource::Status,
            cycle,
        });

        if !self.settings.status_push_enabled {
            self.events.emit(AdapterEvent::FlushFinished {
                source: PushSource::Status,
                cycle,
                result: PushResult::admin_down(PushSource::Status),
            });
            return FlushFollowUp::Done;
        }

        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(statuses.len());
        let mut retryable: Vec<StatusUpdate> = Vec::new();

        for update in statuses {
            let call = match &update.change {
                StatusChange::Busy { new, .. } => {
                    self.client
                        .set_busy_status(&update.evse, update.recorded_at, new)
                        .await
                }
                StatusChange::Availability { new, .. } => {
                    self.client
                        .set_availability_status(&update.evse, update.recorded_at, new)
                        .await
                }
            };
            match call {
                Ok(outcome) => {
                    if !outcome.accepted {
                        retryable.push(update.clone());
                    }
                    outcomes.push(item_from_partner(update.evse.to_string(), &outcome));
                }
                Err(err) if err.is_retryable() => {
                    retryable.push(update.clone());
                    outcomes.push(ItemOutcome::failed(update.evse.to_string(), err.to_string()));
                }
                Err(err) => {
                    outcomes.push(ItemOutcome::invalid(update.evse.to_string(), err.to_string()));
                }
            }
        }

        let runtime_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = flatten(PushSource::Status, &outcomes, runtime_ms);
        debug!(cycle, result = %result.status, "fast status cycle completed");
        self.events.emit(AdapterEvent::FlushFinished {
            source: PushSource::Status,
            cycle,
            result,
        });

        if self.settings.retry_failed_pushes && !retryable.is_empty() {
            let count = retryable.len();
            // Failed tuples retry on the full flush cadence, not the fast
            // one, to avoid hammering a struggling partner.
            self.queue.restore_statuses(retryable);
            self.data_flush.arm();
            self.events.emit(AdapterEvent::Warning {
                source: PushSource::Status,
                message: format!("{count} failed status updates deferred to the full flush"),
            });
        }

        FlushFollowUp::Done
    }
}
