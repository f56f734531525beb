//! Synchronization run orchestrator.
//!
//! A run walks every active source in fixed-size batches. Sources within a
//! batch are processed concurrently; each one goes through fetch, parse,
//! per-user diff and insert in order. Per-source failures are recorded in the
//! failure map and never abort the run.
//!
//! At most one run executes at a time per process. The running flag lives in
//! [`RunStatus`] behind a mutex owned by [`SyncService`]; it is not shared
//! between processes, so deployments must run a single instance.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::audit::{ActivityEvent, ActivityKind, ActivityLog, TracingActivityLog};
use super::clock::{Clock, SystemClock};
use super::failure::{FailureTracker, FeedHealth};
use super::status::{RunStatus, RunStatusSnapshot};
use crate::config::SyncConfig;
use crate::db::Database;
use crate::feed::dedup::{candidates, filter_new};
use crate::feed::fetcher::{FeedFetcher, FetchError};
use crate::feed::parser::{parse_feed, ParseError, ParseOptions};
use crate::feed::registry::SourceRepository;
use crate::feed::repository::ItemRepository;
use crate::feed::slug::generate_slug;
use crate::feed::types::{CandidateItem, NewItem, Source};

/// Trigger name for runs started by an administrator.
pub const TRIGGER_MANUAL: &str = "manual";

/// Trigger name for runs started by the scheduler or the cron endpoint.
pub const TRIGGER_CRON: &str = "cron";

/// Errors that prevent a run from producing a report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// Another run is in progress; nothing was started or changed.
    #[error("a synchronization run is already in progress")]
    AlreadyRunning,

    /// The run could not proceed at all, typically because the database is
    /// unreachable.
    #[error("synchronization failed: {0}")]
    Fatal(String),
}

/// Failure while processing one source. Recorded, never propagated.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The feed could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The feed body could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Reading subscribers or writing items failed.
    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Parameters of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Empty the failure map before processing.
    pub clear_failed: bool,
    /// What started the run; recorded in the activity log.
    pub trigger: String,
}

impl RunOptions {
    /// Options for an administrator-triggered run.
    pub fn manual() -> Self {
        Self {
            clear_failed: false,
            trigger: TRIGGER_MANUAL.to_string(),
        }
    }

    /// Options for a scheduled run.
    pub fn cron() -> Self {
        Self {
            clear_failed: false,
            trigger: TRIGGER_CRON.to_string(),
        }
    }

    /// Set whether the failure map is cleared first.
    pub fn with_clear_failed(mut self, clear_failed: bool) -> Self {
        self.clear_failed = clear_failed;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::manual()
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Active sources at the start of the run.
    pub sources_total: usize,
    /// Sources that were fetched (successfully or not).
    pub sources_processed: usize,
    /// Items inserted across all users.
    pub new_items: u64,
    /// Sources that failed.
    pub failures: usize,
    /// Sources skipped because nobody subscribes to them.
    pub skipped_no_users: usize,
    /// Sources skipped because they failed within the cooldown window.
    pub skipped_recent_failure: usize,
    /// Wall time of the run.
    pub duration_ms: u64,
}

impl RunStats {
    /// Whether the run counts as successful: false only when sources were
    /// processed and every one of them failed.
    pub fn is_success(&self) -> bool {
        !(self.sources_processed > 0 && self.failures == self.sources_processed)
    }

    /// Multi-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Synchronization finished in {} ms\n\
             Sources: {} active, {} processed\n\
             New items: {}\n\
             Failures: {}\n\
             Skipped (no subscribers): {}\n\
             Skipped (recent failure): {}",
            self.duration_ms,
            self.sources_total,
            self.sources_processed,
            self.new_items,
            self.failures,
            self.skipped_no_users,
            self.skipped_recent_failure,
        )
    }

    fn apply(&mut self, outcome: &SourceOutcome) {
        match outcome {
            SourceOutcome::Synced { new_items } => {
                self.sources_processed += 1;
                self.new_items += new_items;
            }
            SourceOutcome::Failed { new_items } => {
                self.sources_processed += 1;
                self.failures += 1;
                self.new_items += new_items;
            }
            SourceOutcome::SkippedNoUsers => self.skipped_no_users += 1,
            SourceOutcome::SkippedRecentFailure => self.skipped_recent_failure += 1,
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run ID.
    pub run_id: Uuid,
    /// What started the run.
    pub trigger: String,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: DateTime<Utc>,
    /// See [`RunStats::is_success`].
    pub success: bool,
    /// Set when every processed source failed.
    pub error: Option<String>,
    /// Counters.
    pub stats: RunStats,
    /// Multi-line summary.
    pub summary: String,
    /// Run log lines.
    pub logs: Vec<String>,
}

/// A run started in the background.
pub struct SpawnedRun {
    /// ID of the started run.
    pub run_id: Uuid,
    /// Resolves when the run finishes.
    pub handle: JoinHandle<Result<RunReport, RunError>>,
}

/// A run that holds the running flag.
struct ActiveRun {
    run_id: Uuid,
    trigger: String,
    started_at: DateTime<Utc>,
    timer: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceOutcome {
    Synced { new_items: u64 },
    Failed { new_items: u64 },
    SkippedNoUsers,
    SkippedRecentFailure,
}

/// Owns the run state and drives synchronization runs.
pub struct SyncService {
    db: Database,
    fetcher: Arc<dyn FeedFetcher>,
    activity: Arc<dyn ActivityLog>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    parse_options: ParseOptions,
    status: Mutex<RunStatus>,
}

impl SyncService {
    /// Create a service using the system clock and a tracing-only activity log.
    pub fn new(db: Database, fetcher: Arc<dyn FeedFetcher>, config: SyncConfig) -> Self {
        let status = RunStatus::new(
            config.max_log_lines,
            FailureTracker::with_cooldown_secs(config.failure_cooldown_secs),
        );
        Self {
            db,
            fetcher,
            activity: Arc::new(TracingActivityLog),
            clock: Arc::new(SystemClock),
            parse_options: ParseOptions::from(&config),
            config,
            status: Mutex::new(status),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the activity log.
    pub fn with_activity_log(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = activity;
        self
    }

    /// Database used by the service.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run a full synchronization and wait for it to finish.
    pub async fn run(&self, options: RunOptions) -> Result<RunReport, RunError> {
        let run = self.begin_run(&options).await?;
        self.execute(run).await
    }

    /// Start a full synchronization in a background task.
    ///
    /// The conflict check happens before this returns, so a second call while
    /// a run is active fails with [`RunError::AlreadyRunning`].
    pub async fn spawn_run(self: &Arc<Self>, options: RunOptions) -> Result<SpawnedRun, RunError> {
        let run = self.begin_run(&options).await?;
        let run_id = run.run_id;
        let service = Arc::clone(self);
        let handle = tokio::spawn(async move { service.execute(run).await });
        Ok(SpawnedRun { run_id, handle })
    }

    /// Point-in-time copy of the run status.
    pub async fn status(&self) -> RunStatusSnapshot {
        self.status.lock().await.snapshot()
    }

    /// Whether a run is in progress.
    pub async fn is_running(&self) -> bool {
        self.status.lock().await.is_running()
    }

    /// Empty the failure map. Returns the number of entries removed.
    pub async fn clear_failures(&self) -> usize {
        let now = self.clock.now();
        let mut status = self.status.lock().await;
        let cleared = status.failures_mut().clear();
        status.log(now, &format!("Cleared {cleared} failed feed(s)"));
        info!("Cleared {} failed feed(s)", cleared);
        cleared
    }

    async fn begin_run(&self, options: &RunOptions) -> Result<ActiveRun, RunError> {
        let run_id = Uuid::new_v4();
        let now = self.clock.now();

        let mut status = self.status.lock().await;
        if !status.try_begin(run_id) {
            debug!("Synchronization already running; {} request refused", options.trigger);
            return Err(RunError::AlreadyRunning);
        }

        if options.clear_failed {
            let cleared = status.failures_mut().clear();
            status.log(now, &format!("Cleared {cleared} failed feed(s)"));
        }
        status.log(
            now,
            &format!("Synchronization started (trigger: {})", options.trigger),
        );
        info!(%run_id, trigger = %options.trigger, "Synchronization started");

        Ok(ActiveRun {
            run_id,
            trigger: options.trigger.clone(),
            started_at: now,
            timer: Instant::now(),
        })
    }

    async fn execute(&self, run: ActiveRun) -> Result<RunReport, RunError> {
        self.audit(ActivityEvent {
            kind: ActivityKind::SyncStarted,
            trigger: run.trigger.clone(),
            success: true,
            message: None,
            metadata: json!({ "run_id": run.run_id }),
        })
        .await;

        match self.sweep(&run).await {
            Ok(stats) => Ok(self.complete(run, stats).await),
            Err(message) => Err(self.abort(run, message).await),
        }
    }

    async fn sweep(&self, run: &ActiveRun) -> Result<RunStats, String> {
        let sources = SourceRepository::new(self.db.pool())
            .list_active()
            .await
            .map_err(|e| e.to_string())?;

        let mut stats = RunStats {
            sources_total: sources.len(),
            ..RunStats::default()
        };
        self.note(format!("Found {} active source(s)", sources.len()))
            .await;

        let batch_size = self.config.batch_size.max(1);
        let batch_count = sources.len().div_ceil(batch_size);
        let delay = Duration::from_millis(self.config.batch_delay_ms);

        for (index, batch) in sources.chunks(batch_size).enumerate() {
            if index > 0 && !delay.is_zero() {
                sleep(delay).await;
            }
            self.note(format!(
                "Processing batch {}/{} ({} source(s))",
                index + 1,
                batch_count,
                batch.len()
            ))
            .await;

            let outcomes = join_all(batch.iter().map(|source| self.process_source(source))).await;
            for outcome in &outcomes {
                stats.apply(outcome);
            }
        }

        stats.duration_ms = u64::try_from(run.timer.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(stats)
    }

    async fn complete(&self, run: ActiveRun, stats: RunStats) -> RunReport {
        let finished_at = self.clock.now();
        let success = stats.is_success();
        let error = (!success).then(|| {
            format!(
                "all {} processed source(s) failed",
                stats.sources_processed
            )
        });
        let summary = stats.summary();

        let logs = {
            let mut status = self.status.lock().await;
            for line in summary.lines() {
                status.log(finished_at, line);
            }
            status.finish(finished_at, error.clone());
            status.run_log().lines()
        };

        if success {
            info!(
                run_id = %run.run_id,
                new_items = stats.new_items,
                failures = stats.failures,
                duration_ms = stats.duration_ms,
                "Synchronization completed"
            );
        } else {
            warn!(
                run_id = %run.run_id,
                failures = stats.failures,
                "Synchronization finished with every source failing"
            );
        }

        self.audit(ActivityEvent {
            kind: if success {
                ActivityKind::SyncCompleted
            } else {
                ActivityKind::SyncFailed
            },
            trigger: run.trigger.clone(),
            success,
            message: Some(error.clone().unwrap_or_else(|| {
                format!(
                    "{} new item(s) from {} source(s)",
                    stats.new_items, stats.sources_processed
                )
            })),
            metadata: json!({ "run_id": run.run_id, "stats": &stats }),
        })
        .await;

        RunReport {
            run_id: run.run_id,
            trigger: run.trigger,
            started_at: run.started_at,
            finished_at,
            success,
            error,
            stats,
            summary,
            logs,
        }
    }

    async fn abort(&self, run: ActiveRun, message: String) -> RunError {
        let now = self.clock.now();
        {
            let mut status = self.status.lock().await;
            status.log(now, &format!("Synchronization failed: {message}"));
            status.finish(now, Some(message.clone()));
        }
        error!(run_id = %run.run_id, "Synchronization failed: {}", message);

        let duration_ms = u64::try_from(run.timer.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.audit(ActivityEvent {
            kind: ActivityKind::SyncFailed,
            trigger: run.trigger,
            success: false,
            message: Some(message.clone()),
            metadata: json!({ "run_id": run.run_id, "duration_ms": duration_ms }),
        })
        .await;

        RunError::Fatal(message)
    }

    async fn process_source(&self, source: &Source) -> SourceOutcome {
        let health = {
            let now = self.clock.now();
            let mut status = self.status.lock().await;
            let health = status.failures_mut().check(&source.url, now);
            match &health {
                FeedHealth::Backoff(entry) => {
                    let minutes = now.signed_duration_since(entry.failed_at).num_minutes();
                    status.log(
                        now,
                        &format!(
                            "Skipping {}: failed {} minute(s) ago ({})",
                            source.url, minutes, entry.error
                        ),
                    );
                }
                FeedHealth::Recovered(entry) => {
                    status.log(
                        now,
                        &format!(
                            "Retrying {}: cooldown elapsed since failure ({})",
                            source.url, entry.error
                        ),
                    );
                }
                FeedHealth::Healthy => {}
            }
            health
        };
        if matches!(health, FeedHealth::Backoff(_)) {
            debug!("Skipping {} (recent failure)", source.url);
            return SourceOutcome::SkippedRecentFailure;
        }

        let users = match SourceRepository::new(self.db.pool())
            .subscriber_ids(source.id)
            .await
        {
            Ok(users) => users,
            Err(e) => {
                let err = SourceError::Persistence(e.to_string());
                self.record_failure(source, &err).await;
                return SourceOutcome::Failed { new_items: 0 };
            }
        };
        if users.is_empty() {
            self.note(format!("Skipping {}: no subscribers", source.url))
                .await;
            return SourceOutcome::SkippedNoUsers;
        }

        let entries = match self.fetch_candidates(source).await {
            Ok(entries) => entries,
            Err(err) => {
                self.record_failure(source, &err).await;
                return SourceOutcome::Failed { new_items: 0 };
            }
        };

        let mut new_items = 0;
        let mut first_error = None;
        for user_id in users {
            match self.sync_user(user_id, source.id, &entries).await {
                Ok(inserted) => new_items += inserted,
                Err(err) => {
                    warn!(
                        "Failed to store items of {} for user {}: {}",
                        source.url, user_id, err
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            self.record_failure(source, &err).await;
            return SourceOutcome::Failed { new_items };
        }

        self.note(format!(
            "Synced {}: {} entr{}, {} new item(s)",
            source.url,
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" },
            new_items
        ))
        .await;
        SourceOutcome::Synced { new_items }
    }

    async fn fetch_candidates(&self, source: &Source) -> Result<Vec<CandidateItem>, SourceError> {
        let fetched = self.fetcher.fetch(&source.url).await?;
        let entries = parse_feed(
            &fetched.body,
            fetched.content_type.as_deref(),
            Some(&source.url),
            &self.parse_options,
            self.clock.now(),
        )?;
        Ok(candidates(entries))
    }

    /// Diff `entries` against what `user_id` already has from this source and
    /// insert the rest.
    async fn sync_user(
        &self,
        user_id: i64,
        source_id: i64,
        entries: &[CandidateItem],
    ) -> Result<u64, SourceError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let items = ItemRepository::new(self.db.pool());
        let urls: Vec<String> = entries.iter().map(|c| c.url.clone()).collect();
        let existing = items
            .existing_urls(user_id, source_id, &urls)
            .await
            .map_err(|e| SourceError::Persistence(e.to_string()))?;

        let fresh = filter_new(entries, &existing);
        if fresh.is_empty() {
            return Ok(0);
        }

        let rows: Vec<NewItem> = fresh
            .iter()
            .map(|c| NewItem::from_candidate(c, generate_slug()))
            .collect();
        items
            .insert_batch(user_id, source_id, &rows)
            .await
            .map_err(|e| SourceError::Persistence(e.to_string()))
    }

    async fn record_failure(&self, source: &Source, err: &SourceError) {
        let now = self.clock.now();
        let message = err.to_string();
        warn!("Failed to sync {}: {}", source.url, message);

        let mut status = self.status.lock().await;
        status
            .failures_mut()
            .record(&source.url, message.clone(), now);
        status.log(now, &format!("Failed {}: {}", source.url, message));
    }

    /// Append a line to the run log and the tracing log.
    async fn note(&self, message: String) {
        debug!("{}", message);
        let now = self.clock.now();
        self.status.lock().await.log(now, &message);
    }

    async fn audit(&self, event: ActivityEvent) {
        if let Err(e) = self.activity.record(&event).await {
            error!("Failed to record {} event: {}", event.kind.as_str(), e);
        }
    }
}
