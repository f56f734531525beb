//! Per-source failure backoff.
//!
//! Each source URL is either healthy (no entry) or failed with a timestamp.
//! A failed source is skipped until the cooldown has elapsed, at which point
//! its entry is dropped and the source is retried.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Default cooldown after a failure (24 hours).
pub const DEFAULT_FAILURE_COOLDOWN_SECS: u64 = 24 * 60 * 60;

/// A recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    /// When the failure happened.
    pub failed_at: DateTime<Utc>,
    /// Error message.
    pub error: String,
}

/// Outcome of checking a source before processing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedHealth {
    /// No failure on record.
    Healthy,
    /// A failure was on record but the cooldown has elapsed; the entry was
    /// removed and the source should be retried.
    Recovered(FailureEntry),
    /// Failed within the cooldown window; skip this source.
    Backoff(FailureEntry),
}

/// Failure map keyed by source URL.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    cooldown: Duration,
    entries: HashMap<String, FailureEntry>,
}

impl FailureTracker {
    /// Create an empty tracker with the given cooldown.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            entries: HashMap::new(),
        }
    }

    /// Create an empty tracker with the cooldown in seconds.
    pub fn with_cooldown_secs(secs: u64) -> Self {
        let cooldown = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self::new(cooldown)
    }

    /// Cooldown window.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Record a failure for `url`, replacing any previous entry.
    pub fn record(&mut self, url: &str, error: impl Into<String>, now: DateTime<Utc>) {
        self.entries.insert(
            url.to_string(),
            FailureEntry {
                failed_at: now,
                error: error.into(),
            },
        );
    }

    /// Check whether `url` may be processed at `now`.
    ///
    /// Expired entries are removed as a side effect.
    pub fn check(&mut self, url: &str, now: DateTime<Utc>) -> FeedHealth {
        let Some(entry) = self.entries.get(url) else {
            return FeedHealth::Healthy;
        };

        if now.signed_duration_since(entry.failed_at) < self.cooldown {
            return FeedHealth::Backoff(entry.clone());
        }

        match self.entries.remove(url) {
            Some(entry) => FeedHealth::Recovered(entry),
            None => FeedHealth::Healthy,
        }
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Failure on record for `url`.
    pub fn get(&self, url: &str) -> Option<&FailureEntry> {
        self.entries.get(url)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no failure is on record.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted copy of the failure map.
    pub fn entries(&self) -> BTreeMap<String, FailureEntry> {
        self.entries
            .iter()
            .map(|(url, entry)| (url.clone(), entry.clone()))
            .collect()
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::with_cooldown_secs(DEFAULT_FAILURE_COOLDOWN_SECS)
    }
}
