//! In-process run status: running flag, run log and failure map.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::failure::{FailureEntry, FailureTracker};

/// Default cap on retained log lines.
pub const DEFAULT_MAX_LOG_LINES: usize = 1000;

/// Lifecycle state of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run has happened yet.
    Idle,
    /// A run is in progress.
    Running,
    /// The last run finished.
    Completed,
    /// The last run failed as a whole.
    Failed,
}

/// Bounded log of human-readable lines; the oldest line is evicted first.
#[derive(Debug, Clone)]
pub struct RunLog {
    lines: VecDeque<String>,
    max_lines: usize,
}

impl RunLog {
    /// Create an empty log holding at most `max_lines` lines.
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines,
        }
    }

    /// Append a line stamped with `at`.
    pub fn push(&mut self, at: DateTime<Utc>, message: &str) {
        if self.max_lines == 0 {
            return;
        }
        while self.lines.len() >= self.max_lines {
            self.lines.pop_front();
        }
        self.lines
            .push_back(format!("[{}] {}", at.format("%Y-%m-%d %H:%M:%S"), message));
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Number of retained lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Copy of the retained lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

/// Process-wide run state. Lives behind the service's mutex.
#[derive(Debug)]
pub struct RunStatus {
    state: RunState,
    last_error: Option<String>,
    last_run_at: Option<DateTime<Utc>>,
    current_run_id: Option<Uuid>,
    log: RunLog,
    failures: FailureTracker,
}

impl RunStatus {
    /// Create an idle status.
    pub fn new(max_log_lines: usize, failures: FailureTracker) -> Self {
        Self {
            state: RunState::Idle,
            last_error: None,
            last_run_at: None,
            current_run_id: None,
            log: RunLog::new(max_log_lines),
            failures,
        }
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Mark a run as started. Returns false when one is already running,
    /// in which case nothing is changed.
    pub fn try_begin(&mut self, run_id: Uuid) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = RunState::Running;
        self.current_run_id = Some(run_id);
        self.last_error = None;
        self.log.clear();
        true
    }

    /// Mark the current run as finished.
    pub fn finish(&mut self, at: DateTime<Utc>, error: Option<String>) {
        self.state = if error.is_some() {
            RunState::Failed
        } else {
            RunState::Completed
        };
        self.last_error = error;
        self.last_run_at = Some(at);
        self.current_run_id = None;
    }

    /// Append a line to the run log.
    pub fn log(&mut self, at: DateTime<Utc>, message: &str) {
        self.log.push(at, message);
    }

    /// Run log.
    pub fn run_log(&self) -> &RunLog {
        &self.log
    }

    /// Failure map.
    pub fn failures(&self) -> &FailureTracker {
        &self.failures
    }

    /// Mutable failure map.
    pub fn failures_mut(&mut self) -> &mut FailureTracker {
        &mut self.failures
    }

    /// Point-in-time copy for callers outside the lock.
    pub fn snapshot(&self) -> RunStatusSnapshot {
        RunStatusSnapshot {
            is_running: self.is_running(),
            status: self.state,
            last_error: self.last_error.clone(),
            last_run_at: self.last_run_at,
            current_run_id: self.current_run_id,
            logs: self.log.lines(),
            failed_feeds: self.failures.entries(),
        }
    }
}

/// Serializable copy of [`RunStatus`].
#[derive(Debug, Clone, Serialize)]
pub struct RunStatusSnapshot {
    /// Whether a run is in progress.
    pub is_running: bool,
    /// State of the current or most recent run.
    pub status: RunState,
    /// Error of the most recent run, if it failed.
    pub last_error: Option<String>,
    /// Completion time of the most recent run.
    pub last_run_at: Option<DateTime<Utc>>,
    /// ID of the run in progress.
    pub current_run_id: Option<Uuid>,
    /// Log lines of the current or most recent run.
    pub logs: Vec<String>,
    /// Failure map keyed by feed URL.
    pub failed_feeds: BTreeMap<String, FailureEntry>,
}
