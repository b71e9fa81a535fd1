//! Sync coordinator
//!
//! Reconciles the persistent store against current connectivity. Each drain
//! of one store is list -> submit sequentially in insertion order -> clear
//! the listed snapshot. A submission failure aborts that store's drain and
//! leaves the rest queued for the next trigger; delivery is at-least-once by
//! design, made deduplicable by the per-entry idempotency key.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::offline::{OfflineQueue, QueueName, SyncTrigger};
use crate::error::ActionError;
use crate::ports::{ActionSubmitter, ConnectivityProbe, DurableQueue, SyncScheduler};

/// Buffer for triggers arriving between coordinator polls.
const TRIGGER_BUFFER: usize = 16;

/// Drains the persistent store when connectivity returns or a background
/// sync trigger fires.
pub struct SyncCoordinator {
    store: Arc<dyn DurableQueue>,
    submitter: Arc<dyn ActionSubmitter>,
    connectivity: Arc<dyn ConnectivityProbe>,
    scheduler: Arc<dyn SyncScheduler>,
    queue: Arc<OfflineQueue>,
    /// At most one drain runs at a time, whatever triggered it.
    drain_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn DurableQueue>,
        submitter: Arc<dyn ActionSubmitter>,
        connectivity: Arc<dyn ConnectivityProbe>,
        scheduler: Arc<dyn SyncScheduler>,
        queue: Arc<OfflineQueue>,
    ) -> Self {
        Self {
            store,
            submitter,
            connectivity,
            scheduler,
            queue,
            drain_lock: Mutex::new(()),
        }
    }

    /// Start the background task watching connectivity transitions and
    /// scheduler triggers.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<SyncTrigger>(TRIGGER_BUFFER);
        self.scheduler.on_trigger(Box::new(move |trigger| {
            if trigger_tx.try_send(trigger).is_err() {
                tracing::warn!(%trigger, "sync trigger dropped, channel full");
            }
        }));

        let mut connected_rx = self.connectivity.subscribe();
        tokio::spawn(async move {
            let mut was_online = *connected_rx.borrow();
            loop {
                tokio::select! {
                    changed = connected_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *connected_rx.borrow();
                        if online && !was_online {
                            tracing::info!("connectivity restored, draining all queues");
                            self.drain_all().await;
                        }
                        was_online = online;
                    }
                    trigger = trigger_rx.recv() => match trigger {
                        Some(trigger) => {
                            tracing::debug!(%trigger, "sync trigger received");
                            self.drain(trigger.queue()).await;
                        }
                        None => break,
                    }
                }
            }
            tracing::debug!("sync coordinator stopped");
        })
    }

    /// Drain every store. One store's failure does not stop the others; the
    /// queues are independent streams with no cross-queue ordering.
    pub async fn drain_all(&self) {
        for queue in QueueName::ALL {
            self.drain(queue).await;
        }
    }

    /// Drain one store and refresh the pending count. Failures leave the
    /// remaining entries in place and re-arm the store's sync trigger.
    pub async fn drain(&self, queue: QueueName) {
        let _guard = self.drain_lock.lock().await;
        if let Err(e) = self.drain_inner(queue).await {
            tracing::error!(%queue, error = %e, "drain aborted, entries remain queued");
            self.scheduler.register(queue.trigger());
        }
        if let Err(e) = self.queue.refresh_pending().await {
            tracing::warn!(error = %e, "pending count refresh failed after drain");
        }
    }

    async fn drain_inner(&self, queue: QueueName) -> Result<(), ActionError> {
        let entries = self.store.list(queue).await?;
        let Some(last) = entries.last() else {
            return Ok(());
        };
        let last_id = last.id;
        let kind = queue.action();
        tracing::info!(%queue, count = entries.len(), "draining store");

        // Sequential on purpose: each entry awaits the previous one's result
        // so causally ordered edits replay in order.
        for entry in &entries {
            let payload = entry.payload_with_key();
            self.submitter.submit_queued(kind, &payload).await?;
        }

        // Clear only the listed snapshot; entries appended mid-drain keep
        // their place for the next trigger.
        self.store.clear_through(queue, last_id).await?;
        tracing::info!(%queue, "store drained and cleared");
        Ok(())
    }
}
