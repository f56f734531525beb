//! Activity log for synchronization runs.
//!
//! Every run start, completion and failure is reported as an
//! [`ActivityEvent`] through the [`ActivityLog`] trait.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::{parse_datetime, DbPool};
use crate::{PesosError, Result};

/// Kind of activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// A run began.
    SyncStarted,
    /// A run finished.
    SyncCompleted,
    /// A run failed as a whole.
    SyncFailed,
}

impl ActivityKind {
    /// Stored name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::SyncStarted => "sync_started",
            ActivityKind::SyncCompleted => "sync_completed",
            ActivityKind::SyncFailed => "sync_failed",
        }
    }
}

/// A structured activity event.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    /// Event type.
    pub kind: ActivityKind,
    /// What started the run (`manual`, `cron`, ...).
    pub trigger: String,
    /// Whether the run succeeded.
    pub success: bool,
    /// Human-readable message.
    pub message: Option<String>,
    /// Counts, timing and other details.
    pub metadata: serde_json::Value,
}

/// Sink for activity events.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Record one event.
    async fn record(&self, event: &ActivityEvent) -> Result<()>;
}

/// Stores events in the `activity_log` table.
pub struct DbActivityLog {
    pool: DbPool,
}

impl DbActivityLog {
    /// Create a sink writing through `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Most recent events, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<ActivityRecord>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, event_type, triggered_by, success, message, metadata, created_at
             FROM activity_log
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(ActivityRecord::from).collect())
    }
}

#[async_trait]
impl ActivityLog for DbActivityLog {
    async fn record(&self, event: &ActivityEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO activity_log (event_type, triggered_by, success, message, metadata)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(event.kind.as_str())
        .bind(&event.trigger)
        .bind(event.success)
        .bind(&event.message)
        .bind(event.metadata.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(())
    }
}

/// Writes events to the tracing log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActivityLog;

#[async_trait]
impl ActivityLog for TracingActivityLog {
    async fn record(&self, event: &ActivityEvent) -> Result<()> {
        if event.success {
            info!(
                event = event.kind.as_str(),
                trigger = %event.trigger,
                metadata = %event.metadata,
                "{}",
                event.message.as_deref().unwrap_or_default()
            );
        } else {
            warn!(
                event = event.kind.as_str(),
                trigger = %event.trigger,
                metadata = %event.metadata,
                "{}",
                event.message.as_deref().unwrap_or_default()
            );
        }
        Ok(())
    }
}

/// Row type for an activity event from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    event_type: String,
    triggered_by: String,
    success: bool,
    message: Option<String>,
    metadata: String,
    created_at: String,
}

/// A stored activity event.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    /// Row ID.
    pub id: i64,
    /// Event type name.
    pub event_type: String,
    /// What started the run.
    pub trigger: String,
    /// Whether the run succeeded.
    pub success: bool,
    /// Human-readable message.
    pub message: Option<String>,
    /// Decoded metadata; `null` if the stored text is not JSON.
    pub metadata: serde_json::Value,
    /// When the event was stored.
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ActivityRow> for ActivityRecord {
    fn from(row: ActivityRow) -> Self {
        ActivityRecord {
            id: row.id,
            event_type: row.event_type,
            trigger: row.triggered_by,
            success: row.success,
            message: row.message,
            metadata: serde_json::from_str(&row.metadata).unwrap_or_default(),
            created_at: parse_datetime(&row.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::json;

    fn event(kind: ActivityKind, success: bool) -> ActivityEvent {
        ActivityEvent {
            kind,
            trigger: "manual".to_string(),
            success,
            message: Some("2 new items".to_string()),
            metadata: json!({ "new_items": 2, "duration_ms": 15 }),
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ActivityKind::SyncStarted.as_str(), "sync_started");
        assert_eq!(
            serde_json::to_value(ActivityKind::SyncFailed).unwrap(),
            json!("sync_failed")
        );
    }

    #[tokio::test]
    async fn test_db_activity_log_roundtrip() {
        let db = Database::open_in_memory().await.unwrap();
        let log = DbActivityLog::new(db.pool().clone());

        log.record(&event(ActivityKind::SyncStarted, true))
            .await
            .unwrap();
        log.record(&event(ActivityKind::SyncCompleted, true))
            .await
            .unwrap();

        let recent = log.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event_type, "sync_completed");
        assert_eq!(recent[0].trigger, "manual");
        assert!(recent[0].success);
        assert_eq!(recent[0].metadata["new_items"], 2);
        assert!(recent[0].created_at.is_some());
    }

    #[tokio::test]
    async fn test_tracing_activity_log_accepts_events() {
        let log = TracingActivityLog;
        assert!(log
            .record(&event(ActivityKind::SyncFailed, false))
            .await
            .is_ok());
    }
}
