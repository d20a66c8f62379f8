//! Observability events emitted by the synchronization engine
//!
//! Events are fire-and-forget: sinks must be cheap and non-blocking because
//! they are invoked from enqueue paths and scheduler workers.

use roamsync_domain::{PushResult, PushSource};
use uuid::Uuid;

use crate::queue::QueueDepths;

/// Which queue a change entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClass {
    Addition,
    Update,
    Removal,
    FastStatus,
    DelayedStatus,
    ChargeRecord,
}

impl ChangeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Update => "update",
            Self::Removal => "removal",
            Self::FastStatus => "fast_status",
            Self::DelayedStatus => "delayed_status",
            Self::ChargeRecord => "charge_record",
        }
    }
}

/// Engine lifecycle events.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// A change was accepted into a queue.
    ChangeEnqueued {
        item: String,
        class: ChangeClass,
        depths: QueueDepths,
    },
    /// A flush cycle began draining its snapshot.
    FlushStarted { source: PushSource, cycle: u64 },
    /// A flush cycle finished; carries the composite result.
    FlushFinished {
        source: PushSource,
        cycle: u64,
        result: PushResult,
    },
    /// A heartbeat attempt started.
    HeartbeatStarted { run: u64, correlation_id: Uuid },
    /// A heartbeat attempt finished, acknowledged or not.
    HeartbeatFinished {
        run: u64,
        accepted: bool,
        runtime_ms: u64,
    },
    /// A heartbeat tick fired while the previous attempt was still running.
    HeartbeatSkipped { last_run: u64 },
    /// Non-fatal condition worth surfacing (rejected items, requeues).
    Warning { source: PushSource, message: String },
}

/// Receiver for engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AdapterEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: AdapterEvent) {}
}
