//! Capability ports injected into the session layer
//!
//! The browser original reached for ambient singletons (`navigator.onLine`,
//! `indexedDB`, the service-worker sync registration). Here each of those is
//! an explicit trait passed in at construction, so tests substitute in-memory
//! fakes and non-browser targets substitute their own backends.
//!
//! All ports are object-safe; the client stores them as `Arc<dyn ...>`.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{StoreError, SubmitError};
use crate::offline::{ActionKind, QueueName, StoredEntry, SyncTrigger};

/// Reports whether a live session connection currently exists.
///
/// The connection manager's connected flag is the canonical implementation;
/// tests drive a bare watch channel.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;

    /// A receiver that observes every connectivity transition.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// The durable, restart-surviving store behind the offline queue.
///
/// Entries in one queue are totally ordered by `id`; `list` returns them in
/// insertion order. `clear_through` removes only entries with `id <=
/// last_id`, so an entry appended while a drain is in flight survives the
/// drain's clear.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DurableQueue: Send + Sync {
    async fn append(
        &self,
        queue: QueueName,
        payload: serde_json::Value,
    ) -> Result<StoredEntry, StoreError>;

    async fn list(&self, queue: QueueName) -> Result<Vec<StoredEntry>, StoreError>;

    async fn clear_through(&self, queue: QueueName, last_id: i64) -> Result<(), StoreError>;

    async fn count(&self, queue: QueueName) -> Result<u64, StoreError>;
}

/// Host scheduling capability standing in for background-sync registration.
///
/// `register` marks a trigger as wanted; the implementation fires it at the
/// handler at some later point of its own choosing (periodic tick, host
/// wakeup). Triggers are one-shot: once fired they must be registered again
/// to fire again.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait SyncScheduler: Send + Sync {
    fn register(&self, trigger: SyncTrigger);

    /// Install the handler invoked for every fired trigger. Later calls
    /// replace earlier ones; the sync coordinator is the only caller.
    fn on_trigger(&self, callback: Box<dyn Fn(SyncTrigger) + Send + Sync + 'static>);
}

/// Submits one action to the server.
///
/// `submit` is the immediate path (live socket first, REST fallback);
/// `submit_queued` is the drain path and uses the sync-specific REST
/// endpoints. Both resolve only once the submission outcome is known.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ActionSubmitter: Send + Sync {
    async fn submit(
        &self,
        kind: ActionKind,
        payload: &serde_json::Value,
    ) -> Result<(), SubmitError>;

    async fn submit_queued(
        &self,
        kind: ActionKind,
        payload: &serde_json::Value,
    ) -> Result<(), SubmitError>;
}
