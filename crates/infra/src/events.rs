//! Tracing-backed event sink
//!
//! Maps engine events onto structured log records. Flush results and
//! heartbeat outcomes log at info, queue traffic at debug, warnings at warn.

use roamsync_core::{AdapterEvent, EventSink};
use tracing::{debug, info, warn};

/// Event sink that forwards every engine event to `tracing`.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: AdapterEvent) {
        match event {
            AdapterEvent::ChangeEnqueued { item, class, depths } => {
                debug!(
                    item = %item,
                    class = class.as_str(),
                    additions = depths.additions,
                    updates = depths.updates,
                    removals = depths.removals,
                    fast_status = depths.fast_status,
                    delayed_status = depths.delayed_status,
                    records = depths.records,
                    "change enqueued"
                );
            }
            AdapterEvent::FlushStarted { source, cycle } => {
                debug!(source = %source, cycle, "flush cycle started");
            }
            AdapterEvent::FlushFinished { source, cycle, result } => {
                info!(
                    source = %source,
                    cycle,
                    status = %result.status,
                    runtime_ms = result.runtime_ms,
                    "flush cycle finished"
                );
            }
            AdapterEvent::HeartbeatStarted { run, correlation_id } => {
                debug!(run, correlation_id = %correlation_id, "heartbeat attempt started");
            }
            AdapterEvent::HeartbeatFinished { run, accepted, runtime_ms } => {
                if accepted {
                    info!(run, runtime_ms, "heartbeat acknowledged");
                } else {
                    warn!(run, runtime_ms, "heartbeat not acknowledged");
                }
            }
            AdapterEvent::HeartbeatSkipped { last_run } => {
                warn!(last_run, "heartbeat tick skipped, previous attempt still running");
            }
            AdapterEvent::Warning { source, message } => {
                warn!(source = %source, message = %message, "adapter warning");
            }
        }
    }
}
