//! Periodic synchronization.
//!
//! This module provides a background task that triggers a run at a fixed
//! interval with the `cron` trigger.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use super::service::{RunError, RunOptions, SyncService};
use crate::config::SchedulerConfig;

/// Default interval between runs in seconds (1 hour).
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 3600;

/// Background scheduler for synchronization runs.
pub struct SyncScheduler {
    service: Arc<SyncService>,
    interval: Duration,
}

impl SyncScheduler {
    /// Create a scheduler with the default interval.
    pub fn new(service: Arc<SyncService>) -> Self {
        Self::with_interval(service, DEFAULT_SYNC_INTERVAL_SECS)
    }

    /// Create a scheduler with a custom interval.
    pub fn with_interval(service: Arc<SyncService>, interval_secs: u64) -> Self {
        Self {
            service,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Interval between runs.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the scheduler loop.
    ///
    /// The first tick fires immediately. Runs indefinitely.
    pub async fn run(&self) {
        info!(
            "Sync scheduler started (interval: {} seconds)",
            self.interval.as_secs()
        );

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            self.tick().await;
        }
    }

    /// Trigger one run.
    async fn tick(&self) {
        match self.service.run(RunOptions::cron()).await {
            Ok(report) => debug!(
                "Scheduled run {} finished: {} new item(s)",
                report.run_id, report.stats.new_items
            ),
            Err(RunError::AlreadyRunning) => {
                debug!("Scheduled run skipped: a run is already in progress")
            }
            Err(e) => error!("Scheduled run failed: {}", e),
        }
    }
}

/// Start the scheduler as a background task if it is enabled.
pub fn start_scheduler(
    service: Arc<SyncService>,
    config: &SchedulerConfig,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("Sync scheduler disabled");
        return None;
    }

    let scheduler = SyncScheduler::with_interval(service, config.interval_secs);
    Some(tokio::spawn(async move {
        scheduler.run().await;
    }))
}
