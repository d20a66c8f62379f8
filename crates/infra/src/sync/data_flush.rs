//! Full-data flush job
//!
//! Drains the complete change snapshot and transmits it as up to four batch
//! steps: create, update, status (delayed plus captured fast tuples), delete.
//! Steps run outside the queue lock and fail independently; a failing step
//! never cancels its siblings.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use roamsync_core::{
    flatten, item_from_partner, AdapterEvent, ChangeQueue, EventSink, PartnerClient,
};
use roamsync_domain::{
    DataPushMode, EvseId, ItemOutcome, ItemVerdict, PushSource, StatusChange, StatusUpdate,
    SyncSettings,
};
use tracing::{debug, instrument, warn};

use crate::sync::debounce::{FlushFollowUp, FlushJob};

/// Per-step result: the item outcomes plus the subset eligible for retry.
struct StepResult<T> {
    outcomes: Vec<ItemOutcome>,
    retryable: Vec<T>,
}

impl<T> StepResult<T> {
    fn empty() -> Self {
        Self {
            outcomes: Vec::new(),
            retryable: Vec::new(),
        }
    }
}

/// Flush job draining the full change snapshot.
pub struct DataFlushJob {
    queue: Arc<ChangeQueue>,
    client: Arc<dyn PartnerClient>,
    events: Arc<dyn EventSink>,
    settings: SyncSettings,
    cycle: AtomicU64,
}

impl DataFlushJob {
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

    async fn push_data_step(&self, entities: &[EvseId], mode: DataPushMode) -> StepResult<EvseId> {
        if entities.is_empty() {
            return StepResult::empty();
        }
        if !self.settings.data_push_enabled {
            return StepResult {
                outcomes: entities
                    .iter()
                    .map(|evse| ItemOutcome::admin_down(evse.to_string()))
                    .collect(),
                retryable: Vec::new(),
            };
        }

        match self.client.push_evse_data(entities, mode).await {
            Ok(batch) => {
                let retryable = batch
                    .items
                    .iter()
                    .zip(entities)
                    .filter(|(outcome, _)| {
                        matches!(
                            outcome.verdict,
                            ItemVerdict::Rejected { .. } | ItemVerdict::Failed { .. }
                        )
                    })
                    .map(|(_, evse)| evse.clone())
                    .collect();
                StepResult {
                    outcomes: batch.items,
                    retryable,
                }
            }
            Err(err) => {
                warn!(mode = %mode, error = %err, "batch data push failed");
                let retryable = if err.is_retryable() {
                    entities.to_vec()
                } else {
                    Vec::new()
                };
                let message = err.to_string();
                let outcomes = entities
                    .iter()
                    .map(|evse| {
                        if err.is_retryable() {
                            ItemOutcome::failed(evse.to_string(), &message)
                        } else {
                            ItemOutcome::invalid(evse.to_string(), &message)
                        }
                    })
                    .collect();
                StepResult {
                    outcomes,
                    retryable,
                }
            }
        }
    }

    async fn push_status_step(&self, statuses: Vec<StatusUpdate>) -> StepResult<StatusUpdate> {
        if statuses.is_empty() {
            return StepResult::empty();
        }
        if !self.settings.status_push_enabled {
            return StepResult {
                outcomes: statuses
                    .iter()
                    .map(|update| ItemOutcome::admin_down(update.evse.to_string()))
                    .collect(),
                retryable: Vec::new(),
            };
        }

        let mut outcomes = Vec::with_capacity(statuses.len());
        let mut retryable = Vec::new();
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
                Err(err) => {
                    if err.is_retryable() {
                        retryable.push(update.clone());
                        outcomes.push(ItemOutcome::failed(update.evse.to_string(), err.to_string()));
                    } else {
                        outcomes
                            .push(ItemOutcome::invalid(update.evse.to_string(), err.to_string()));
                    }
                }
            }
        }
        StepResult {
            outcomes,
            retryable,
        }
    }
}

#[async_trait]
impl FlushJob for DataFlushJob {
    #[instrument(skip(self))]
    async fn flush(&self) -> FlushFollowUp {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let batch = self.queue.drain_all();

        self.events.emit(AdapterEvent::FlushStarted {
            source: PushSource::Data,
            cycle,
        });

        if batch.is_empty() {
            self.events.emit(AdapterEvent::FlushFinished {
                source: PushSource::Data,
                cycle,
                result: roamsync_domain::PushResult::no_operation(PushSource::Data),
            });
            return FlushFollowUp::Done;
        }

        let started = Instant::now();

        let create = self.push_data_step(&batch.to_add, DataPushMode::Create).await;

        // The queue guarantees to_add and to_update stay disjoint; filter
        // defensively so a created entity is never also pushed as an update.
        let updates: Vec<EvseId> = batch
            .to_update
            .iter()
            .filter(|evse| !batch.to_add.contains(evse))
            .cloned()
            .collect();
        let update = self.push_data_step(&updates, DataPushMode::Update).await;

        let statuses = batch.coalesced_statuses();
        let status_count = statuses.len();
        let status = self.push_status_step(statuses).await;

        let remove = self.push_data_step(&batch.to_remove, DataPushMode::Delete).await;

        let runtime_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let data_outcomes: Vec<ItemOutcome> = create
            .outcomes
            .into_iter()
            .chain(update.outcomes)
            .chain(remove.outcomes)
            .collect();
        let data_result = flatten(PushSource::Data, &data_outcomes, runtime_ms);
        debug!(
            cycle,
            additions = batch.to_add.len(),
            updates = updates.len(),
            removals = batch.to_remove.len(),
            statuses = status_count,
            result = %data_result.status,
            "full flush cycle completed"
        );
        self.events.emit(AdapterEvent::FlushFinished {
            source: PushSource::Data,
            cycle,
            result: data_result,
        });

        if status_count > 0 {
            let status_result = flatten(PushSource::Status, &status.outcomes, runtime_ms);
            self.events.emit(AdapterEvent::FlushFinished {
                source: PushSource::Status,
                cycle,
                result: status_result,
            });
        }

        if !self.settings.retry_failed_pushes {
            return FlushFollowUp::Done;
        }

        let requeued = create.retryable.len()
            + update.retryable.len()
            + remove.retryable.len()
            + status.retryable.len();
        if requeued == 0 {
            return FlushFollowUp::Done;
        }

        self.queue.restore_additions(create.retryable);
        self.queue.restore_updates(update.retryable);
        self.queue.restore_removals(remove.retryable);
        self.queue.restore_statuses(status.retryable);
        self.events.emit(AdapterEvent::Warning {
            source: PushSource::Data,
            message: format!("{requeued} failed items returned to the queue for retry"),
        });
        FlushFollowUp::Rearm
    }
}
