//! Feed registry: sources and the users subscribed to them.

use chrono::Utc;

use super::types::{Source, UserSource};
use crate::db::{parse_datetime, DbPool};
use crate::{PesosError, Result};

/// Row type for a source from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SourceRow {
    id: i64,
    url: String,
    active: String,
    created_at: String,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        Source {
            id: row.id,
            url: row.url,
            active: row.active == "Y",
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Row type for a subscription from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserSourceRow {
    user_id: i64,
    source_id: i64,
    created_at: String,
}

impl From<UserSourceRow> for UserSource {
    fn from(row: UserSourceRow) -> Self {
        UserSource {
            user_id: row.user_id,
            source_id: row.source_id,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for sources and subscriptions.
pub struct SourceRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SourceRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Register a new source. Fails if the URL is already registered.
    pub async fn create(&self, url: &str) -> Result<Source> {
        let id: i64 = sqlx::query_scalar("INSERT INTO sources (url) VALUES (?) RETURNING id")
            .bind(url)
            .fetch_one(self.pool)
            .await
            .map_err(|e| PesosError::Database(e.to_string()))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| PesosError::NotFound("source".into()))
    }

    /// Return the source registered under `url`, registering it if needed.
    pub async fn get_or_create(&self, url: &str) -> Result<Source> {
        sqlx::query("INSERT OR IGNORE INTO sources (url) VALUES (?)")
            .bind(url)
            .execute(self.pool)
            .await
            .map_err(|e| PesosError::Database(e.to_string()))?;

        self.get_by_url(url)
            .await?
            .ok_or_else(|| PesosError::NotFound("source".into()))
    }

    /// Get a source by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(
            "SELECT id, url, active, created_at FROM sources WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(row.map(Source::from))
    }

    /// Get a source by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(
            "SELECT id, url, active, created_at FROM sources WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(row.map(Source::from))
    }

    /// List active sources in registration order.
    pub async fn list_active(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            "SELECT id, url, active, created_at FROM sources WHERE active = 'Y' ORDER BY id ASC",
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    /// Activate or deactivate a source.
    pub async fn set_active(&self, id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE sources SET active = ? WHERE id = ?")
            .bind(if active { "Y" } else { "N" })
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Subscribe a user to a source. Returns false if already subscribed.
    pub async fn subscribe(&self, user_id: i64, source_id: i64) -> Result<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO user_sources (user_id, source_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(source_id)
                .execute(self.pool)
                .await
                .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a subscription.
    pub async fn unsubscribe(&self, user_id: i64, source_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_sources WHERE user_id = ? AND source_id = ?")
            .bind(user_id)
            .bind(source_id)
            .execute(self.pool)
            .await
            .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// List the subscriptions of a source, oldest first.
    pub async fn subscriptions(&self, source_id: i64) -> Result<Vec<UserSource>> {
        let rows = sqlx::query_as::<_, UserSourceRow>(
            "SELECT user_id, source_id, created_at FROM user_sources
             WHERE source_id = ?
             ORDER BY created_at ASC, user_id ASC",
        )
        .bind(source_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(UserSource::from).collect())
    }

    /// IDs of the users subscribed to a source.
    pub async fn subscriber_ids(&self, source_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT user_id FROM user_sources WHERE source_id = ? ORDER BY user_id ASC",
        )
        .bind(source_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(ids)
    }
}
