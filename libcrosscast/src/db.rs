//! Durable queue store backed by SQLite
//!
//! All lifecycle transitions go through guarded UPDATEs keyed on
//! `(id, status)`. A transition that matches zero rows re-reads the item
//! to report either `NotFound` or `InvalidState`, so concurrent callers
//! can never double-apply a transition.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, QueueError, Result};
use crate::types::{
    Content, ErrorEntry, PlatformOutcome, PostResults, QueueItem, QueueStats, QueueStatus,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    max_retries: u32,
}

impl Database {
    /// Open (or create) the queue database at `db_path` and run migrations.
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::with_max_retries(db_path, crate::types::MAX_RETRIES).await
    }

    /// Open the database with a custom retry ceiling for failed items.
    pub async fn with_max_retries(db_path: &str, max_retries: u32) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Use forward slashes for SQLite URL (works on both Windows and Unix)
        // Use mode=rwc to allow creating the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool, max_retries })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Insert a new item into the queue in `pending` state.
    pub async fn add(&self, item: &QueueItem) -> Result<()> {
        if item.platforms.is_empty() {
            return Err(QueueError::EmptyPlatforms.into());
        }

        let content = serde_json::to_string(&item.content).map_err(DbError::DecodeError)?;
        let platforms = serde_json::to_string(&item.platforms).map_err(DbError::DecodeError)?;
        let errors = serde_json::to_string(&item.errors).map_err(DbError::DecodeError)?;

        sqlx::query(
            r#"
            INSERT INTO queue_items
                (id, content, platforms, status, attempts, errors, rejected_reason,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(content)
        .bind(platforms)
        .bind(item.status.as_str())
        .bind(item.attempts as i64)
        .bind(errors)
        .bind(&item.rejected_reason)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get an item by ID.
    pub async fn get(&self, id: &str) -> Result<Option<QueueItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, content, platforms, status, attempts, errors, post_results,
                   rejected_reason, created_at, updated_at,
                   approved_at, rejected_at, posted_at, failed_at
            FROM queue_items WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(row_to_item).transpose()
    }

    /// List items in a given state, oldest first.
    pub async fn list_by_status(&self, status: QueueStatus) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, platforms, status, attempts, errors, post_results,
                   rejected_reason, created_at, updated_at,
                   approved_at, rejected_at, posted_at, failed_at
            FROM queue_items WHERE status = ? ORDER BY created_at ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.into_iter().map(row_to_item).collect()
    }

    /// List every item, oldest first.
    pub async fn list_all(&self) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, platforms, status, attempts, errors, post_results,
                   rejected_reason, created_at, updated_at,
                   approved_at, rejected_at, posted_at, failed_at
            FROM queue_items ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.into_iter().map(row_to_item).collect()
    }

    /// Transition `pending -> approved`.
    pub async fn approve(&self, id: &str) -> Result<QueueItem> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE queue_items
            SET status = 'approved', approved_at = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(self.state_conflict(id, QueueStatus::Pending).await);
        }
        self.fetch_existing(id).await
    }

    /// Transition `pending -> rejected`, recording an optional reason.
    pub async fn reject(&self, id: &str, reason: Option<&str>) -> Result<QueueItem> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE queue_items
            SET status = 'rejected', rejected_reason = ?, rejected_at = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(reason)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(self.state_conflict(id, QueueStatus::Pending).await);
        }
        self.fetch_existing(id).await
    }

    /// Transition `approved -> posted` after a publish cycle with at least
    /// one platform success, storing the per-platform outcomes.
    pub async fn record_success(&self, id: &str, results: &PostResults) -> Result<QueueItem> {
        let now = chrono::Utc::now().timestamp();
        let results_json = serde_json::to_string(results).map_err(DbError::DecodeError)?;

        let result = sqlx::query(
            r#"
            UPDATE queue_items
            SET status = 'posted', post_results = ?, posted_at = ?, updated_at = ?
            WHERE id = ? AND status = 'approved'
            "#,
        )
        .bind(results_json)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(self.state_conflict(id, QueueStatus::Approved).await);
        }
        self.fetch_existing(id).await
    }

    /// Record a fully-failed publish cycle.
    ///
    /// Increments the attempt counter and appends to the error log. Below
    /// the retry ceiling the item stays `approved` for the next poll;
    /// at the ceiling it transitions to `failed`.
    pub async fn record_failure(
        &self,
        id: &str,
        error_message: &str,
        results: &PostResults,
    ) -> Result<QueueItem> {
        let item = self
            .get(id)
            .await?
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        if item.status != QueueStatus::Approved {
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                expected: QueueStatus::Approved.as_str().to_string(),
                actual: item.status.as_str().to_string(),
            }
            .into());
        }

        let now = chrono::Utc::now().timestamp();
        let attempts = item.attempts + 1;
        let exhausted = attempts >= self.max_retries;

        let mut errors = item.errors.clone();
        errors.push(ErrorEntry {
            message: error_message.to_string(),
            timestamp: now,
            attempt: attempts,
        });
        let errors_json = serde_json::to_string(&errors).map_err(DbError::DecodeError)?;
        let results_json = serde_json::to_string(results).map_err(DbError::DecodeError)?;

        // The status guard makes the read-modify-write safe: a concurrent
        // transition since the read above makes this match zero rows.
        let result = if exhausted {
            sqlx::query(
                r#"
                UPDATE queue_items
                SET status = 'failed', attempts = ?, errors = ?, post_results = ?,
                    failed_at = ?, updated_at = ?
                WHERE id = ? AND status = 'approved' AND attempts = ?
                "#,
            )
            .bind(attempts as i64)
            .bind(errors_json)
            .bind(results_json)
            .bind(now)
            .bind(now)
            .bind(id)
            .bind(item.attempts as i64)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?
        } else {
            sqlx::query(
                r#"
                UPDATE queue_items
                SET attempts = ?, errors = ?, post_results = ?, updated_at = ?
                WHERE id = ? AND status = 'approved' AND attempts = ?
                "#,
            )
            .bind(attempts as i64)
            .bind(errors_json)
            .bind(results_json)
            .bind(now)
            .bind(id)
            .bind(item.attempts as i64)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?
        };

        if result.rows_affected() == 0 {
            return Err(self.state_conflict(id, QueueStatus::Approved).await);
        }
        self.fetch_existing(id).await
    }

    /// Delete an item outright, in any state.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM queue_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(id.to_string()).into());
        }
        Ok(())
    }

    /// Delete terminal items older than `max_age_days`. Returns the number
    /// of rows removed. Pending and approved items are never touched.
    pub async fn cleanup(&self, max_age_days: u32) -> Result<u64> {
        let cutoff = chrono::Utc::now().timestamp() - i64::from(max_age_days) * 86_400;

        let result = sqlx::query(
            r#"
            DELETE FROM queue_items
            WHERE status IN ('rejected', 'posted', 'failed') AND updated_at < ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected())
    }

    /// Aggregate counts per lifecycle state.
    pub async fn stats(&self) -> Result<QueueStats> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) as count FROM queue_items GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let mut stats = QueueStats::default();
        for row in rows {
            let status: String = row.get("status");
            let count: i64 = row.get("count");
            let count = count as u64;
            stats.total += count;
            let status = QueueStatus::parse(&status)
                .ok_or_else(|| DbError::UnknownStatus(status.clone()))?;
            match status {
                QueueStatus::Pending => stats.pending = count,
                QueueStatus::Approved => stats.approved = count,
                QueueStatus::Rejected => stats.rejected = count,
                QueueStatus::Posted => stats.posted = count,
                QueueStatus::Failed => stats.failed = count,
            }
        }
        Ok(stats)
    }

    /// Build the error for a guarded UPDATE that matched no rows.
    async fn state_conflict(&self, id: &str, expected: QueueStatus) -> crate::error::CrosscastError {
        match self.get(id).await {
            Ok(Some(item)) => QueueError::InvalidState {
                id: id.to_string(),
                expected: expected.as_str().to_string(),
                actual: item.status.as_str().to_string(),
            }
            .into(),
            Ok(None) => QueueError::NotFound(id.to_string()).into(),
            Err(e) => e,
        }
    }

    async fn fetch_existing(&self, id: &str) -> Result<QueueItem> {
        self.get(id)
            .await?
            .ok_or_else(|| QueueError::NotFound(id.to_string()).into())
    }
}

fn row_to_item(row: sqlx::sqlite::SqliteRow) -> Result<QueueItem> {
    let content: Content =
        serde_json::from_str(&row.get::<String, _>("content")).map_err(DbError::DecodeError)?;
    let platforms: Vec<String> =
        serde_json::from_str(&row.get::<String, _>("platforms")).map_err(DbError::DecodeError)?;
    let errors: Vec<ErrorEntry> =
        serde_json::from_str(&row.get::<String, _>("errors")).map_err(DbError::DecodeError)?;
    let post_results: Option<PostResults> = row
        .get::<Option<String>, _>("post_results")
        .map(|s| serde_json::from_str::<std::collections::BTreeMap<String, PlatformOutcome>>(&s))
        .transpose()
        .map_err(DbError::DecodeError)?;

    // A status string the state machine does not know means the row was
    // tampered with; refusing to decode it keeps terminal rows terminal.
    let status_str: String = row.get("status");
    let status =
        QueueStatus::parse(&status_str).ok_or_else(|| DbError::UnknownStatus(status_str))?;

    Ok(QueueItem {
        id: row.get("id"),
        content,
        platforms,
        status,
        attempts: row.get::<i64, _>("attempts") as u32,
        errors,
        post_results,
        rejected_reason: row.get("rejected_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        approved_at: row.get("approved_at"),
        rejected_at: row.get("rejected_at"),
        posted_at: row.get("posted_at"),
        failed_at: row.get("failed_at"),
    })
}
