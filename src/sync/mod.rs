//! Synchronization module for PESOS.
//!
//! This module provides the run orchestrator, the in-process run status and
//! failure backoff, the activity log and the periodic scheduler.

pub mod audit;
pub mod clock;
pub mod failure;
pub mod scheduler;
pub mod service;
pub mod status;

pub use audit::{
    ActivityEvent, ActivityKind, ActivityLog, ActivityRecord, DbActivityLog, TracingActivityLog,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use failure::{FailureEntry, FailureTracker, FeedHealth, DEFAULT_FAILURE_COOLDOWN_SECS};
pub use scheduler::{start_scheduler, SyncScheduler, DEFAULT_SYNC_INTERVAL_SECS};
pub use service::{
    RunError, RunOptions, RunReport, RunStats, SourceError, SpawnedRun, SyncService,
    TRIGGER_CRON, TRIGGER_MANUAL,
};
pub use status::{RunLog, RunState, RunStatus, RunStatusSnapshot, DEFAULT_MAX_LOG_LINES};
