//! Offline queue
//!
//! Front door for every durable action: send immediately while connected,
//! persist otherwise. Enqueueing also registers the store's background-sync
//! trigger so the coordinator gets a wakeup even if connectivity never
//! visibly "restores" (host-scheduled sync).

use std::sync::Arc;

use tokio::sync::watch;

use super::{ActionKind, QueueName};
use crate::error::{ActionError, StoreError};
use crate::ports::{ActionSubmitter, ConnectivityProbe, DurableQueue, SyncScheduler};

/// Immediate acknowledgement of a `submit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Delivered to the server right away.
    Sent,
    /// Persisted for later replay; the caller is done waiting.
    Queued { entry_id: i64 },
}

/// Decides, per outgoing action, between immediate send and durable enqueue.
pub struct OfflineQueue {
    store: Arc<dyn DurableQueue>,
    submitter: Arc<dyn ActionSubmitter>,
    connectivity: Arc<dyn ConnectivityProbe>,
    scheduler: Arc<dyn SyncScheduler>,
    pending_tx: watch::Sender<u64>,
}

impl OfflineQueue {
    pub fn new(
        store: Arc<dyn DurableQueue>,
        submitter: Arc<dyn ActionSubmitter>,
        connectivity: Arc<dyn ConnectivityProbe>,
        scheduler: Arc<dyn SyncScheduler>,
    ) -> Self {
        let (pending_tx, _) = watch::channel(0);
        Self {
            store,
            submitter,
            connectivity,
            scheduler,
            pending_tx,
        }
    }

    /// Submit one action. Never blocks on network availability: while
    /// disconnected the action is persisted and acknowledged immediately.
    pub async fn submit(
        &self,
        kind: ActionKind,
        payload: serde_json::Value,
    ) -> Result<Ack, ActionError> {
        if self.connectivity.is_online() {
            self.submitter.submit(kind, &payload).await?;
            return Ok(Ack::Sent);
        }

        let queue = kind.queue();
        let entry = self.store.append(queue, payload).await?;
        self.scheduler.register(queue.trigger());
        if let Err(e) = self.refresh_pending().await {
            tracing::warn!(error = %e, "pending count refresh failed after enqueue");
        }
        tracing::info!(%queue, id = entry.id, "action queued while offline");
        Ok(Ack::Queued { entry_id: entry.id })
    }

    /// Current pending total across all stores.
    pub async fn pending_count(&self) -> Result<u64, StoreError> {
        let mut total = 0;
        for queue in QueueName::ALL {
            total += self.store.count(queue).await?;
        }
        Ok(total)
    }

    /// Recompute the pending total and publish it to watchers. Called after
    /// every store mutation (enqueue here, clears by the sync coordinator).
    pub async fn refresh_pending(&self) -> Result<u64, StoreError> {
        let total = self.pending_count().await?;
        self.pending_tx.send_replace(total);
        Ok(total)
    }

    /// Observe the pending total without polling the store.
    pub fn watch_pending(&self) -> watch::Receiver<u64> {
        self.pending_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::{MemoryStore, SyncTrigger};
    use crate::ports::{MockActionSubmitter, MockConnectivityProbe, MockSyncScheduler};

    fn probe(online: bool) -> Arc<MockConnectivityProbe> {
        let mut probe = MockConnectivityProbe::new();
        probe.expect_is_online().return_const(online);
        Arc::new(probe)
    }

    #[tokio::test]
    async fn test_connected_submits_immediately() {
        let mut submitter = MockActionSubmitter::new();
        submitter
            .expect_submit()
            .withf(|kind, payload| {
                *kind == ActionKind::ChatMessage && payload["message"] == "hi"
            })
            .once()
            .returning(|_, _| Ok(()));
        let scheduler = MockSyncScheduler::new();

        let store = Arc::new(MemoryStore::new());
        let queue = OfflineQueue::new(
            Arc::clone(&store) as Arc<dyn DurableQueue>,
            Arc::new(submitter),
            probe(true),
            Arc::new(scheduler),
        );

        let ack = queue
            .submit(ActionKind::ChatMessage, serde_json::json!({ "message": "hi" }))
            .await
            .expect("submit");

        assert_eq!(ack, Ack::Sent);
        assert_eq!(queue.pending_count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_disconnected_persists_and_registers_trigger() {
        let mut submitter = MockActionSubmitter::new();
        submitter.expect_submit().never();
        let mut scheduler = MockSyncScheduler::new();
        scheduler
            .expect_register()
            .with(mockall::predicate::eq(SyncTrigger::ChatMessages))
            .once()
            .return_const(());

        let store = Arc::new(MemoryStore::new());
        let queue = OfflineQueue::new(
            Arc::clone(&store) as Arc<dyn DurableQueue>,
            Arc::new(submitter),
            probe(false),
            Arc::new(scheduler),
        );
        let mut pending = queue.watch_pending();

        let ack = queue
            .submit(ActionKind::ChatMessage, serde_json::json!({ "message": "hello" }))
            .await
            .expect("submit");

        assert!(matches!(ack, Ack::Queued { .. }));
        assert_eq!(*pending.borrow_and_update(), 1);

        let stored = store.list(QueueName::PendingMessages).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].payload["message"], "hello");
    }

    #[tokio::test]
    async fn test_pending_count_sums_all_stores() {
        let submitter = MockActionSubmitter::new();
        let mut scheduler = MockSyncScheduler::new();
        scheduler.expect_register().times(3).return_const(());

        let store = Arc::new(MemoryStore::new());
        let queue = OfflineQueue::new(
            Arc::clone(&store) as Arc<dyn DurableQueue>,
            Arc::new(submitter),
            probe(false),
            Arc::new(scheduler),
        );

        queue
            .submit(ActionKind::DiceRoll, serde_json::json!({ "formula": "1d20" }))
            .await
            .expect("submit");
        queue
            .submit(ActionKind::ChatMessage, serde_json::json!({ "message": "a" }))
            .await
            .expect("submit");
        queue
            .submit(
                ActionKind::CharacterUpdate,
                serde_json::json!({ "character_id": "c1", "updates": {} }),
            )
            .await
            .expect("submit");

        assert_eq!(queue.pending_count().await.expect("count"), 3);
    }

    #[tokio::test]
    async fn test_immediate_submit_failure_propagates() {
        let mut submitter = MockActionSubmitter::new();
        submitter
            .expect_submit()
            .once()
            .returning(|_, _| Err(crate::error::SubmitError::Rejected { status: 500 }));
        let scheduler = MockSyncScheduler::new();

        let store = Arc::new(MemoryStore::new());
        let queue = OfflineQueue::new(
            Arc::clone(&store) as Arc<dyn DurableQueue>,
            Arc::new(submitter),
            probe(true),
            Arc::new(scheduler),
        );

        let result = queue
            .submit(ActionKind::DiceRoll, serde_json::json!({ "formula": "1d6" }))
            .await;
        assert!(matches!(result, Err(ActionError::Submit(_))));
        // A failed immediate send is reported, not silently queued.
        assert_eq!(queue.pending_count().await.expect("count"), 0);
    }
}
