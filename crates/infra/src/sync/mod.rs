//! Synchronization schedulers and flush jobs.

pub mod cdr_flush;
pub mod data_flush;
pub mod debounce;
pub mod error;
pub mod fast_status;
pub mod heartbeat;

pub use cdr_flush::ChargeRecordFlushJob;
pub use data_flush::DataFlushJob;
pub use debounce::{ArmHandle, Debouncer, FlushFollowUp, FlushJob};
pub use error::{SchedulerError, SchedulerResult};
pub use fast_status::FastStatusJob;
pub use heartbeat::{HeartbeatConfig, HeartbeatScheduler};
