//! Roaming adapter facade
//!
//! Owns the change queue, the three debounced flush workers, and the
//! heartbeat scheduler, and exposes the submission surface the charge point
//! fleet calls into. Every submission returns a [`PushResult`]; enqueue-mode
//! calls return as soon as the queue accepted the item, direct-mode calls
//! block on the remote exchange.

use std::sync::Arc;
use std::time::Instant;

use roamsync_core::{
    flatten, item_from_partner, AdapterEvent, ChangeClass, ChangeQueue, EventSink, NullEventSink,
    PartnerClient, PartnerError, QueueDepths,
};
use roamsync_domain::{
    AdapterConfig, ChargeRecord, DataPushMode, EvseId, FieldChange, ItemOutcome, PartnerOutcome,
    PushResult, PushSource, Result, StatusChange, StatusUpdate, TransmissionMode,
};
use tracing::{info, instrument};

use crate::partner::HttpPartnerClient;
use crate::sync::{
    ChargeRecordFlushJob, DataFlushJob, Debouncer, FastStatusJob, HeartbeatConfig,
    HeartbeatScheduler,
};

/// Synchronization adapter for one roaming partner.
///
/// Construct with [`RoamingAdapter::new`], call [`start`](Self::start) to
/// bring up the schedulers, and [`stop`](Self::stop) before dropping. The
/// submission methods are safe to call from any task at any time; before
/// `start` items simply accumulate in the queues.
pub struct RoamingAdapter {
    config: AdapterConfig,
    queue: Arc<ChangeQueue>,
    client: Arc<dyn PartnerClient>,
    events: Arc<dyn EventSink>,
    data_flush: Debouncer,
    fast_flush: Debouncer,
    record_flush: Debouncer,
    heartbeat: HeartbeatScheduler,
}

impl RoamingAdapter {
    /// Build an adapter over the given partner client.
    pub fn new(
        config: AdapterConfig,
        client: Arc<dyn PartnerClient>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;

        let heartbeat = HeartbeatScheduler::new(
            Arc::clone(&client),
            Arc::clone(&events),
            HeartbeatConfig {
                interval: config.sync.heartbeat_interval(),
                enabled: config.sync.heartbeat_enabled,
                partner_id: config.partner.partner_id.clone(),
                join_timeout: std::time::Duration::from_secs(5),
            },
        );

        Ok(Self {
            queue: Arc::new(ChangeQueue::new()),
            client,
            events,
            data_flush: Debouncer::new("data-flush", config.sync.flush_quiet_interval()),
            fast_flush: Debouncer::new("fast-status", config.sync.fast_status_interval()),
            record_flush: Debouncer::new("record-flush", config.sync.record_flush_interval()),
            heartbeat,
            config,
        })
    }

    /// Build an adapter with an HTTP client derived from the configuration
    /// and events going to `tracing`.
    pub fn with_http_client(config: AdapterConfig) -> Result<Self> {
        let client = Arc::new(HttpPartnerClient::new(config.partner.clone())?);
        Self::new(config, client, Arc::new(crate::events::TracingEventSink))
    }

    /// Build an adapter that swallows all events. Mainly for tests.
    pub fn with_null_events(config: AdapterConfig, client: Arc<dyn PartnerClient>) -> Result<Self> {
        Self::new(config, client, Arc::new(NullEventSink))
    }

    /// Start the flush workers and the heartbeat scheduler.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        let data_job = Arc::new(DataFlushJob::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.client),
            Arc::clone(&self.events),
            self.config.sync.clone(),
        ));
        let fast_job = Arc::new(FastStatusJob::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.client),
            Arc::clone(&self.events),
            self.config.sync.clone(),
            self.data_flush.arm_handle(),
        ));
        let record_job = Arc::new(ChargeRecordFlushJob::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.client),
            Arc::clone(&self.events),
            self.config.sync.clone(),
        ));

        self.data_flush.start(data_job)?;
        self.fast_flush.start(fast_job)?;
        self.record_flush.start(record_job)?;
        self.heartbeat.start()?;

        info!(partner = %self.config.partner.partner_id, "roaming adapter started");
        Ok(())
    }

    /// Stop every scheduler. Pending queue contents survive a stop and are
    /// transmitted after the next start.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        let results = [
            self.data_flush.stop().await,
            self.fast_flush.stop().await,
            self.record_flush.stop().await,
            self.heartbeat.stop().await,
        ];
        for result in results {
            result?;
        }
        info!(partner = %self.config.partner.partner_id, "roaming adapter stopped");
        Ok(())
    }

    /// True while all schedulers are running.
    pub fn is_running(&self) -> bool {
        self.data_flush.is_running()
            && self.fast_flush.is_running()
            && self.record_flush.is_running()
            && self.heartbeat.is_running()
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn queue_depths(&self) -> QueueDepths {
        self.queue.depths()
    }

    /// Number of heartbeat attempts started so far.
    pub fn heartbeat_runs(&self) -> u64 {
        self.heartbeat.run_count()
    }

    // ------------------------------------------------------------------
    // Submission surface
    // ------------------------------------------------------------------

    /// Announce a newly commissioned entity.
    #[instrument(skip(self), fields(evse = %evse, mode = ?mode))]
    pub async fn enqueue_addition(&self, evse: EvseId, mode: TransmissionMode) -> PushResult {
        if !self.config.sync.data_push_enabled {
            return PushResult::admin_down(PushSource::Data);
        }
        match mode {
            TransmissionMode::Enqueue => {
                let depths = self.queue.enqueue_addition(evse.clone());
                self.emit_enqueued(evse.to_string(), ChangeClass::Addition, depths);
                self.data_flush.arm();
                PushResult::enqueued(PushSource::Data)
            }
            TransmissionMode::Direct => self.direct_data_push(evse, DataPushMode::Create).await,
        }
    }

    /// Report changed static data for an entity.
    #[instrument(skip(self, changes), fields(evse = %evse, mode = ?mode))]
    pub async fn enqueue_update(
        &self,
        evse: EvseId,
        changes: Vec<FieldChange>,
        mode: TransmissionMode,
    ) -> PushResult {
        if !self.config.sync.data_push_enabled {
            return PushResult::admin_down(PushSource::Data);
        }
        match mode {
            TransmissionMode::Enqueue => {
                let depths = self.queue.enqueue_update(evse.clone(), changes);
                self.emit_enqueued(evse.to_string(), ChangeClass::Update, depths);
                self.data_flush.arm();
                PushResult::enqueued(PushSource::Data)
            }
            TransmissionMode::Direct => self.direct_data_push(evse, DataPushMode::Update).await,
        }
    }

    /// Announce a decommissioned entity.
    #[instrument(skip(self), fields(evse = %evse, mode = ?mode))]
    pub async fn enqueue_removal(&self, evse: EvseId, mode: TransmissionMode) -> PushResult {
        if !self.config.sync.data_push_enabled {
            return PushResult::admin_down(PushSource::Data);
        }
        match mode {
            TransmissionMode::Enqueue => {
                let depths = self.queue.enqueue_removal(evse.clone());
                self.emit_enqueued(evse.to_string(), ChangeClass::Removal, depths);
                self.data_flush.arm();
                PushResult::enqueued(PushSource::Data)
            }
            TransmissionMode::Direct => self.direct_data_push(evse, DataPushMode::Delete).await,
        }
    }

    /// Report a status change. `fast` routes the tuple through the
    /// low-latency status path; otherwise it rides with the next full flush.
    #[instrument(skip(self, update), fields(evse = %update.evse, kind = %update.kind(), fast, mode = ?mode))]
    pub async fn enqueue_status(
        &self,
        update: StatusUpdate,
        fast: bool,
        mode: TransmissionMode,
    ) -> PushResult {
        if !self.config.sync.status_push_enabled {
            return PushResult::admin_down(PushSource::Status);
        }
        match mode {
            TransmissionMode::Enqueue => {
                let class = if fast {
                    ChangeClass::FastStatus
                } else {
                    ChangeClass::DelayedStatus
                };
                let item = update.evse.to_string();
                let depths = self.queue.enqueue_status(update, fast);
                self.emit_enqueued(item, class, depths);
                if fast {
                    self.fast_flush.arm();
                } else {
                    self.data_flush.arm();
                }
                PushResult::enqueued(PushSource::Status)
            }
            TransmissionMode::Direct => {
                let started = Instant::now();
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
                Self::direct_result(PushSource::Status, update.evse.to_string(), call, started)
            }
        }
    }

    /// Submit a finished charging session for billing.
    #[instrument(skip(self, record), fields(session = %record.session_id, mode = ?mode))]
    pub async fn submit_charge_record(
        &self,
        record: ChargeRecord,
        mode: TransmissionMode,
    ) -> PushResult {
        if !self.config.sync.charge_record_push_enabled {
            return PushResult::admin_down(PushSource::ChargeRecords);
        }
        match mode {
            TransmissionMode::Enqueue => {
                let item = record.session_id.clone();
                let depths = self.queue.submit_record(record);
                self.emit_enqueued(item, ChangeClass::ChargeRecord, depths);
                self.record_flush.arm();
                PushResult::enqueued(PushSource::ChargeRecords)
            }
            TransmissionMode::Direct => {
                let started = Instant::now();
                let call = self.client.send_charge_record(&record).await;
                Self::direct_result(
                    PushSource::ChargeRecords,
                    record.session_id.clone(),
                    call,
                    started,
                )
            }
        }
    }

    fn emit_enqueued(&self, item: String, class: ChangeClass, depths: QueueDepths) {
        self.events.emit(AdapterEvent::ChangeEnqueued {
            item,
            class,
            depths,
        });
    }

    async fn direct_data_push(&self, evse: EvseId, push_mode: DataPushMode) -> PushResult {
        let started = Instant::now();
        let entities = [evse.clone()];
        match self.client.push_evse_data(&entities, push_mode).await {
            Ok(batch) => flatten(PushSource::Data, &batch.items, elapsed_ms(started)),
            Err(PartnerError::Timeout(_)) => {
                PushResult::timeout(PushSource::Data, elapsed_ms(started))
            }
            Err(err) => {
                let outcome = if err.is_retryable() {
                    ItemOutcome::failed(evse.to_string(), err.to_string())
                } else {
                    ItemOutcome::invalid(evse.to_string(), err.to_string())
                };
                flatten(PushSource::Data, &[outcome], elapsed_ms(started))
            }
        }
    }

    /// Map a single direct call onto the composite result shape.
    fn direct_result(
        source: PushSource,
        item: String,
        call: std::result::Result<PartnerOutcome, PartnerError>,
        started: Instant,
    ) -> PushResult {
        let runtime_ms = elapsed_ms(started);
        match call {
            Ok(outcome) => flatten(source, &[item_from_partner(item, &outcome)], runtime_ms),
            Err(PartnerError::Timeout(_)) => PushResult::timeout(source, runtime_ms),
            Err(err) => {
                let outcome = if err.is_retryable() {
                    ItemOutcome::failed(item, err.to_string())
                } else {
                    ItemOutcome::invalid(item, err.to_string())
                };
                flatten(source, &[outcome], runtime_ms)
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
