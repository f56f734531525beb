//! Item persistence.

use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use sqlx::{QueryBuilder, Sqlite};

use super::types::{Item, NewItem};
use crate::db::{parse_datetime, DbPool};
use crate::{PesosError, Result};

/// Maximum rows per multi-row statement; keeps bind counts well under
/// SQLite's parameter limit.
const MAX_ROWS_PER_STATEMENT: usize = 100;

/// Row type for an item from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ItemRow {
    id: i64,
    title: String,
    url: String,
    description: Option<String>,
    postdate: String,
    slug: String,
    user_id: i64,
    source_id: i64,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            title: row.title,
            url: row.url,
            description: row.description,
            postdate: parse_datetime(&row.postdate).unwrap_or_else(Utc::now),
            slug: row.slug,
            user_id: row.user_id,
            source_id: row.source_id,
        }
    }
}

/// Repository for stored items.
pub struct ItemRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ItemRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Return which of `urls` are already stored for this user and source.
    ///
    /// One `IN (...)` lookup per hundred URLs rather than one query per URL.
    pub async fn existing_urls(
        &self,
        user_id: i64,
        source_id: i64,
        urls: &[String],
    ) -> Result<HashSet<String>> {
        let mut existing = HashSet::new();

        for chunk in urls.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut query: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT url FROM items WHERE user_id = ");
            query.push_bind(user_id);
            query.push(" AND source_id = ");
            query.push_bind(source_id);
            query.push(" AND url IN (");
            let mut separated = query.separated(", ");
            for url in chunk {
                separated.push_bind(url);
            }
            separated.push_unseparated(")");

            let found: Vec<String> = query
                .build_query_scalar()
                .fetch_all(self.pool)
                .await
                .map_err(|e| PesosError::Database(e.to_string()))?;
            existing.extend(found);
        }

        Ok(existing)
    }

    /// Insert items for a user and source, skipping rows that conflict on
    /// slug or on (user, source, url).
    ///
    /// Runs in one transaction; returns the number of rows actually inserted.
    pub async fn insert_batch(
        &self,
        user_id: i64,
        source_id: i64,
        items: &[NewItem],
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PesosError::Database(e.to_string()))?;
        let mut inserted = 0;

        for chunk in items.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO items (title, url, description, postdate, slug, user_id, source_id) ",
            );
            query.push_values(chunk, |mut row, item| {
                row.push_bind(&item.title)
                    .push_bind(&item.url)
                    .push_bind(&item.description)
                    .push_bind(item.postdate.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .push_bind(&item.slug)
                    .push_bind(user_id)
                    .push_bind(source_id);
            });

            let result = query
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| PesosError::Database(e.to_string()))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(inserted)
    }

    /// Count a user's items.
    pub async fn count_for_user(&self, user_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Count a user's items from one source.
    pub async fn count_for_user_source(&self, user_id: i64, source_id: i64) -> Result<i64> {
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE user_id = ? AND source_id = ?")
                .bind(user_id)
                .bind(source_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(count)
    }

    /// List a user's items, newest first.
    pub async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, title, url, description, postdate, slug, user_id, source_id
             FROM items
             WHERE user_id = ?
             ORDER BY postdate DESC, id DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await
        .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Get an item by its slug.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT id, title, url, description, postdate, slug, user_id, source_id
             FROM items WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| PesosError::Database(e.to_string()))?;

        Ok(row.map(Item::from))
    }
}
