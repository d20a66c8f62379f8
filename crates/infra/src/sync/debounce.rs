//! Debounced flush worker
//!
//! One [`Debouncer`] drives one queue class. Arming replaces the pending
//! deadline instead of stacking timers, so a burst of enqueues produces
//! exactly one flush shortly after the burst ends. The worker holds no lock
//! while the job runs; enqueues arming the next cycle proceed concurrently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::sync::error::{SchedulerError, SchedulerResult};

/// What the worker does after a flush completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushFollowUp {
    /// Nothing left; wait for the next arm.
    Done,
    /// Retryable work was put back; fire again after one quiet interval.
    Rearm,
}

/// A flush job driven by a [`Debouncer`].
#[async_trait]
pub trait FlushJob: Send + Sync {
    /// Drain and transmit one cycle. Must not panic; failures are reported
    /// through events and the follow-up value.
    async fn flush(&self) -> FlushFollowUp;
}

struct DebounceState {
    deadline: Mutex<Option<Instant>>,
    notify: Notify,
}

/// Cloneable handle for arming a [`Debouncer`] from elsewhere (enqueue paths,
/// sibling flush jobs deferring work to another queue class).
#[derive(Clone)]
pub struct ArmHandle {
    state: Arc<DebounceState>,
    quiet_interval: Duration,
}

impl ArmHandle {
    /// (Re)arm the timer, replacing any previously armed deadline.
    pub fn arm(&self) {
        *self.state.deadline.lock() = Some(Instant::now() + self.quiet_interval);
        self.state.notify.notify_one();
    }
}

/// Debounced single-flight scheduler for one queue class.
pub struct Debouncer {
    label: &'static str,
    quiet_interval: Duration,
    join_timeout: Duration,
    state: Arc<DebounceState>,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(label: &'static str, quiet_interval: Duration) -> Self {
        Self {
            label,
            quiet_interval,
            join_timeout: Duration::from_secs(5),
            state: Arc::new(DebounceState {
                deadline: Mutex::new(None),
                notify: Notify::new(),
            }),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// (Re)arm the timer: the flush fires one quiet interval from now,
    /// replacing any previously armed deadline.
    pub fn arm(&self) {
        self.arm_handle().arm();
    }

    /// Handle for arming this debouncer without borrowing it.
    pub fn arm_handle(&self) -> ArmHandle {
        ArmHandle {
            state: Arc::clone(&self.state),
            quiet_interval: self.quiet_interval,
        }
    }

    /// Whether a deadline is currently armed.
    pub fn is_armed(&self) -> bool {
        self.state.deadline.lock().is_some()
    }

    /// Start the worker task.
    #[instrument(skip(self, job), fields(label = self.label))]
    pub fn start(&mut self, job: Arc<dyn FlushJob>) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so restart after stop works
        self.cancellation = CancellationToken::new();

        let state = Arc::clone(&self.state);
        let cancel = self.cancellation.clone();
        let quiet = self.quiet_interval;
        let label = self.label;

        let handle = tokio::spawn(async move {
            Self::run_loop(state, job, quiet, cancel, label).await;
        });
        self.task_handle = Some(handle);

        info!("Debounce worker started");
        Ok(())
    }

    /// Stop the worker, joining it with a bounded timeout. An armed deadline
    /// that has not fired is discarded.
    #[instrument(skip(self), fields(label = self.label))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(self.join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout {
                    seconds: self.join_timeout.as_secs(),
                })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        *self.state.deadline.lock() = None;
        info!("Debounce worker stopped");
        Ok(())
    }

    /// Returns true while the worker task is alive.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn run_loop(
        state: Arc<DebounceState>,
        job: Arc<dyn FlushJob>,
        quiet: Duration,
        cancel: CancellationToken,
        label: &'static str,
    ) {
        loop {
            let deadline = *state.deadline.lock();
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(label, "debounce loop cancelled");
                    break;
                }
                // An arm moved the deadline; loop around and re-read it.
                _ = state.notify.notified() => {}
                () = Self::wait_until(deadline) => {
                    *state.deadline.lock() = None;
                    debug!(label, "quiet interval elapsed, flushing");
                    if job.flush().await == FlushFollowUp::Rearm {
                        let mut guard = state.deadline.lock();
                        // An enqueue during the flush set a fresh deadline;
                        // that one wins.
                        if guard.is_none() {
                            *guard = Some(Instant::now() + quiet);
                        }
                    }
                }
            }
        }
    }

    async fn wait_until(deadline: Option<Instant>) {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(label = self.label, "Debouncer dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
