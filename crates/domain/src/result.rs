//! Composite push results
//!
//! Every synchronization path (flush cycles, direct calls, outbox drains)
//! reports its outcome as a single immutable [`PushResult`]. Callers branch
//! on [`PushStatus`] instead of sentinel values or panics.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which operation family produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushSource {
    Data,
    Status,
    ChargeRecords,
}

impl fmt::Display for PushSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::Status => f.write_str("status"),
            Self::ChargeRecords => f.write_str("charge_records"),
        }
    }
}

/// One item that failed inside a push, with the triggering reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushFailure {
    pub item: String,
    pub reason: String,
}

impl PushFailure {
    pub fn new(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome classification for a push.
///
/// Exactly one of these is produced per flush cycle or per direct call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushStatus {
    /// Nothing to transmit.
    NoOperation,
    /// Accepted into a queue; delivery happens on a later flush.
    Enqueued,
    /// The operation family is administratively disabled.
    AdminDown,
    /// Every item was delivered and acknowledged.
    Success { warnings: Vec<String> },
    /// At least one item failed; `failed` lists exactly which and why.
    Error {
        failed: Vec<PushFailure>,
        warnings: Vec<String>,
    },
    /// The call as a whole did not complete in time.
    Timeout,
}

impl PushStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::NoOperation | Self::Enqueued)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Timeout)
    }
}

impl fmt::Display for PushStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOperation => f.write_str("no_operation"),
            Self::Enqueued => f.write_str("enqueued"),
            Self::AdminDown => f.write_str("admin_down"),
            Self::Success { .. } => f.write_str("success"),
            Self::Error { failed, .. } => write!(f, "error ({} failed)", failed.len()),
            Self::Timeout => f.write_str("timeout"),
        }
    }
}

/// Immutable record of one push attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResult {
    /// Unique id for correlating logs and events.
    pub id: Uuid,
    pub source: PushSource,
    pub status: PushStatus,
    /// Wall-clock time the attempt took, in milliseconds. Zero for results
    /// produced without a remote call (enqueue, admin-down, no-operation).
    pub runtime_ms: u64,
}

impl PushResult {
    fn new(source: PushSource, status: PushStatus, runtime_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            status,
            runtime_ms,
        }
    }

    pub fn no_operation(source: PushSource) -> Self {
        Self::new(source, PushStatus::NoOperation, 0)
    }

    pub fn enqueued(source: PushSource) -> Self {
        Self::new(source, PushStatus::Enqueued, 0)
    }

    pub fn admin_down(source: PushSource) -> Self {
        Self::new(source, PushStatus::AdminDown, 0)
    }

    pub fn success(source: PushSource, warnings: Vec<String>, runtime_ms: u64) -> Self {
        Self::new(source, PushStatus::Success { warnings }, runtime_ms)
    }

    pub fn error(
        source: PushSource,
        failed: Vec<PushFailure>,
        warnings: Vec<String>,
        runtime_ms: u64,
    ) -> Self {
        Self::new(source, PushStatus::Error { failed, warnings }, runtime_ms)
    }

    pub fn timeout(source: PushSource, runtime_ms: u64) -> Self {
        Self::new(source, PushStatus::Timeout, runtime_ms)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Items that failed in this push, empty unless the status is `Error`.
    pub fn failed_items(&self) -> &[PushFailure] {
        match &self.status {
            PushStatus::Error { failed, .. } => failed,
            _ => &[],
        }
    }
}
