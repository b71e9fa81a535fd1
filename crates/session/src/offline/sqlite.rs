//! SQLite store implementation
//!
//! One `queue_entries` table holds every queue; rows are keyed by an
//! auto-increment id, so insertion order and drain order coincide. SQLite's
//! transaction isolation serializes the coordinator's list/clear against
//! appends from the offline queue, which is what keeps an entry enqueued
//! mid-drain from being wiped by the drain's clear.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use super::{QueueName, StoredEntry};
use crate::error::StoreError;
use crate::ports::DurableQueue;

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS queue_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL,
    payload TEXT NOT NULL,
    idempotency_key TEXT NOT NULL,
    enqueued_at TEXT NOT NULL
)";

const QUEUE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_queue_entries_queue ON queue_entries (queue, id)";

/// Durable [`DurableQueue`] backed by a SQLite file.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        sqlx::query(QUEUE_INDEX).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl DurableQueue for SqliteStore {
    async fn append(
        &self,
        queue: QueueName,
        payload: serde_json::Value,
    ) -> Result<StoredEntry, StoreError> {
        let idempotency_key = Uuid::new_v4();
        let enqueued_at = Utc::now();
        let payload_text = serde_json::to_string(&payload)?;

        let result = sqlx::query(
            "INSERT INTO queue_entries (queue, payload, idempotency_key, enqueued_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(queue.store_name())
        .bind(&payload_text)
        .bind(idempotency_key.to_string())
        .bind(enqueued_at)
        .execute(&self.pool)
        .await?;

        Ok(StoredEntry {
            id: result.last_insert_rowid(),
            payload,
            idempotency_key,
            enqueued_at,
        })
    }

    async fn list(&self, queue: QueueName) -> Result<Vec<StoredEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, payload, idempotency_key, enqueued_at FROM queue_entries \
             WHERE queue = ?1 ORDER BY id ASC",
        )
        .bind(queue.store_name())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                let payload_text: String = row.try_get("payload")?;
                let payload = serde_json::from_str(&payload_text)
                    .map_err(|e| StoreError::Corrupt { id, reason: e.to_string() })?;
                let key_text: String = row.try_get("idempotency_key")?;
                let idempotency_key = Uuid::parse_str(&key_text)
                    .map_err(|e| StoreError::Corrupt { id, reason: e.to_string() })?;
                let enqueued_at: DateTime<Utc> = row.try_get("enqueued_at")?;
                Ok(StoredEntry {
                    id,
                    payload,
                    idempotency_key,
                    enqueued_at,
                })
            })
            .collect()
    }

    async fn clear_through(&self, queue: QueueName, last_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM queue_entries WHERE queue = ?1 AND id <= ?2")
            .bind(queue.store_name())
            .bind(last_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self, queue: QueueName) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_entries WHERE queue = ?1")
                .bind(queue.store_name())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}
