//! In-memory store implementation for development and testing
//!
//! Same contract as the SQLite store but nothing survives the process; use
//! it where durability is someone else's problem (unit tests, previews).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{QueueName, StoredEntry};
use crate::error::StoreError;
use crate::ports::DurableQueue;

/// Non-durable [`DurableQueue`] backed by per-queue vectors.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<QueueName, Vec<StoredEntry>>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl DurableQueue for MemoryStore {
    async fn append(
        &self,
        queue: QueueName,
        payload: serde_json::Value,
    ) -> Result<StoredEntry, StoreError> {
        let entry = StoredEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            payload,
            idempotency_key: Uuid::new_v4(),
            enqueued_at: Utc::now(),
        };
        let mut entries = self.entries.write().await;
        entries.entry(queue).or_default().push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, queue: QueueName) -> Result<Vec<StoredEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&queue).cloned().unwrap_or_default())
    }

    async fn clear_through(&self, queue: QueueName, last_id: i64) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if let Some(list) = entries.get_mut(&queue) {
            list.retain(|e| e.id > last_id);
        }
        Ok(())
    }

    async fn count(&self, queue: QueueName) -> Result<u64, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&queue).map(|l| l.len() as u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .append(QueueName::PendingMessages, serde_json::json!({ "n": i }))
                .await
                .expect("append");
        }

        let entries = store.list(QueueName::PendingMessages).await.expect("list");
        let order: Vec<i64> = entries.iter().map(|e| e.payload["n"].as_i64().unwrap_or(-1)).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(entries.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn test_clear_through_spares_later_entries() {
        let store = MemoryStore::new();
        let first = store
            .append(QueueName::PendingRolls, serde_json::json!({ "n": 0 }))
            .await
            .expect("append");
        let second = store
            .append(QueueName::PendingRolls, serde_json::json!({ "n": 1 }))
            .await
            .expect("append");

        store
            .clear_through(QueueName::PendingRolls, first.id)
            .await
            .expect("clear");

        let remaining = store.list(QueueName::PendingRolls).await.expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second.id);
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let store = MemoryStore::new();
        store
            .append(QueueName::PendingRolls, serde_json::json!({}))
            .await
            .expect("append");

        assert_eq!(store.count(QueueName::PendingRolls).await.expect("count"), 1);
        assert_eq!(store.count(QueueName::PendingMessages).await.expect("count"), 0);
    }
}
