//! Heartbeat scheduler
//!
//! Fixed-rate liveness signal, deliberately not debounced: the partner
//! expects the beat on schedule regardless of how long the previous attempt
//! took. Overlap is prevented with a non-blocking guard; a tick that finds an
//! attempt still in flight is dropped, never queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use roamsync_core::{AdapterEvent, EventSink, PartnerClient};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::sync::error::{SchedulerError, SchedulerResult};
use uuid::Uuid;

/// Configuration for the heartbeat scheduler.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Fixed beat interval.
    pub interval: Duration,
    /// When false the ticker keeps running but every tick is a no-op.
    pub enabled: bool,
    /// Identifier sent with every beat.
    pub partner_id: String,
    /// Join timeout when stopping.
    pub join_timeout: Duration,
}

/// Fixed-rate heartbeat scheduler with overlap skipping.
pub struct HeartbeatScheduler {
    client: Arc<dyn PartnerClient>,
    events: Arc<dyn EventSink>,
    config: HeartbeatConfig,
    run_counter: Arc<AtomicU64>,
    attempt_guard: Arc<Mutex<()>>,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl HeartbeatScheduler {
    pub fn new(
        client: Arc<dyn PartnerClient>,
        events: Arc<dyn EventSink>,
        config: HeartbeatConfig,
    ) -> Self {
        Self {
            client,
            events,
            config,
            run_counter: Arc::new(AtomicU64::new(0)),
            attempt_guard: Arc::new(Mutex::new(())),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Number of attempts started so far.
    pub fn run_count(&self) -> u64 {
        self.run_counter.load(Ordering::SeqCst)
    }

    /// Start the ticker task.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let client = Arc::clone(&self.client);
        let events = Arc::clone(&self.events);
        let config = self.config.clone();
        let counter = Arc::clone(&self.run_counter);
        let guard = Arc::clone(&self.attempt_guard);
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::beat_loop(client, events, config, counter, guard, cancel).await;
        });
        self.task_handle = Some(handle);

        info!(interval_secs = self.config.interval.as_secs(), "Heartbeat scheduler started");
        Ok(())
    }

    /// Stop the ticker. An attempt already in flight completes on its own
    /// task and its result is discarded.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(self.config.join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout {
                    seconds: self.config.join_timeout.as_secs(),
                })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!("Heartbeat scheduler stopped");
        Ok(())
    }

    /// Returns true while the ticker task is alive.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn beat_loop(
        client: Arc<dyn PartnerClient>,
        events: Arc<dyn EventSink>,
        config: HeartbeatConfig,
        counter: Arc<AtomicU64>,
        guard: Arc<Mutex<()>>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval yields immediately on the first tick; consume it so the
        // first beat goes out one full interval after start.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("heartbeat loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if !config.enabled {
                        debug!("heartbeat disabled, tick skipped");
                        continue;
                    }

                    match Arc::clone(&guard).try_lock_owned() {
                        Ok(permit) => {
                            let run = counter.fetch_add(1, Ordering::SeqCst) + 1;
                            let correlation_id = Uuid::new_v4();
                            events.emit(AdapterEvent::HeartbeatStarted { run, correlation_id });

                            let client = Arc::clone(&client);
                            let events = Arc::clone(&events);
                            let partner_id = config.partner_id.clone();
                            // The attempt runs on its own task so a slow
                            // partner never delays the ticker.
                            tokio::spawn(async move {
                                let started = Instant::now();
                                let accepted = match client
                                    .send_heartbeat(&partner_id, correlation_id)
                                    .await
                                {
                                    Ok(outcome) => {
                                        if !outcome.accepted {
                                            warn!(run, detail = %outcome.describe(), "heartbeat rejected by partner");
                                        }
                                        outcome.accepted
                                    }
                                    Err(err) => {
                                        warn!(run, error = %err, "heartbeat attempt failed");
                                        false
                                    }
                                };
                                let runtime_ms =
                                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                                events.emit(AdapterEvent::HeartbeatFinished {
                                    run,
                                    accepted,
                                    runtime_ms,
                                });
                                drop(permit);
                            });
                        }
                        Err(_) => {
                            let last_run = counter.load(Ordering::SeqCst);
                            debug!(last_run, "heartbeat tick skipped, attempt still in flight");
                            events.emit(AdapterEvent::HeartbeatSkipped { last_run });
                        }
                    }
                }
            }
        }
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("HeartbeatScheduler dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
