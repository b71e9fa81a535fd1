//! Session client facade
//!
//! The only object external collaborators touch. Composes the connection
//! manager, event dispatcher, offline queue, and sync coordinator; UI code
//! registers callbacks and calls the send methods, never the transport.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use async_trait::async_trait;
use tablebound_shared::{
    ChatMessagePayload, CharacterUpdatePayload, ClientEvent, DiceRollPayload, EventKind,
    NarrationPayload, Player, PlayerActionPayload, ServerEvent, SessionTarget,
};

use crate::backoff::{BackoffPolicy, ExponentialBackoff};
use crate::config::SessionConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::dispatch::EventDispatcher;
use crate::error::SubmitError;
use crate::offline::{Ack, ActionKind, OfflineQueue};
use crate::ports::{ActionSubmitter, ConnectivityProbe, DurableQueue, SyncScheduler};
use crate::rest::ApiClient;
use crate::sync::{SyncCoordinator, TokioScheduler};

/// Client for one multiplayer game session.
///
/// Dice rolls, chat messages, and character updates go through the offline
/// queue and are never lost to a dropped connection; the remaining send
/// methods require a live socket.
pub struct SessionClient {
    dispatcher: Arc<EventDispatcher>,
    manager: Arc<ConnectionManager>,
    queue: Arc<OfflineQueue>,
    coordinator_task: JoinHandle<()>,
}

impl SessionClient {
    /// Create a client with the default exponential-with-jitter reconnect
    /// policy.
    pub fn new(config: SessionConfig, store: Arc<dyn DurableQueue>) -> Result<Self> {
        Self::with_backoff(config, store, Arc::new(ExponentialBackoff::default()))
    }

    /// Create a client with a caller-chosen reconnect policy.
    pub fn with_backoff(
        config: SessionConfig,
        store: Arc<dyn DurableQueue>,
        backoff: Arc<dyn BackoffPolicy>,
    ) -> Result<Self> {
        let dispatcher = Arc::new(EventDispatcher::new());
        let manager = Arc::new(ConnectionManager::new(
            config.ws_base.clone(),
            backoff,
            Arc::clone(&dispatcher),
        ));
        let api = ApiClient::new(config.http_base.clone(), config.request_timeout)?;
        let submitter: Arc<dyn ActionSubmitter> = Arc::new(LiveSubmitter {
            manager: Arc::clone(&manager),
            api,
        });
        let connectivity: Arc<dyn ConnectivityProbe> = Arc::new(dispatcher.connected_signal());
        let scheduler: Arc<dyn SyncScheduler> = TokioScheduler::new(config.sync_interval);

        let queue = Arc::new(OfflineQueue::new(
            Arc::clone(&store),
            Arc::clone(&submitter),
            Arc::clone(&connectivity),
            Arc::clone(&scheduler),
        ));
        let coordinator = Arc::new(SyncCoordinator::new(
            store,
            submitter,
            connectivity,
            scheduler,
            Arc::clone(&queue),
        ));
        let coordinator_task = coordinator.spawn();

        // Entries persisted by a previous process must show up in the pending
        // signal before the first mutation.
        let startup_queue = Arc::clone(&queue);
        tokio::spawn(async move {
            if let Err(e) = startup_queue.refresh_pending().await {
                tracing::warn!(error = %e, "initial pending count refresh failed");
            }
        });

        Ok(Self {
            dispatcher,
            manager,
            queue,
            coordinator_task,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connect to the session named by `target`. Returns immediately;
    /// subscribe to the state watch or register `connect`/`disconnect`
    /// handlers to observe progress.
    pub fn connect(&self, target: SessionTarget) {
        ConnectionManager::connect(Arc::clone(&self.manager), target);
    }

    /// Close intentionally; no reconnect is scheduled.
    pub async fn close(&self) {
        self.manager.close(None).await;
    }

    pub async fn close_with_reason(&self, reason: impl Into<String>) {
        self.manager.close(Some(reason.into())).await;
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.watch_state()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Register a callback for one event kind.
    pub fn on(&self, kind: EventKind, handler: impl FnMut(ServerEvent) + Send + 'static) {
        self.dispatcher.register(kind, handler);
    }

    /// Current connected-player roster.
    pub fn roster(&self) -> Vec<Player> {
        self.dispatcher.roster()
    }

    // =========================================================================
    // Durable sends (queued while offline)
    // =========================================================================

    pub async fn send_dice_roll(&self, payload: DiceRollPayload) -> Result<Ack> {
        let value = serde_json::to_value(&payload)?;
        Ok(self.queue.submit(ActionKind::DiceRoll, value).await?)
    }

    pub async fn send_chat_message(&self, text: impl Into<String>) -> Result<Ack> {
        let payload = ChatMessagePayload {
            message: text.into(),
            idempotency_key: None,
        };
        let value = serde_json::to_value(&payload)?;
        Ok(self.queue.submit(ActionKind::ChatMessage, value).await?)
    }

    pub async fn update_character(&self, payload: CharacterUpdatePayload) -> Result<Ack> {
        let value = serde_json::to_value(&payload)?;
        Ok(self.queue.submit(ActionKind::CharacterUpdate, value).await?)
    }

    // =========================================================================
    // Live-only sends (require the socket)
    // =========================================================================

    pub async fn send_dm_narration(&self, text: impl Into<String>) -> Result<()> {
        self.manager
            .send(ClientEvent::DmNarration(NarrationPayload {
                narration: text.into(),
            }))
            .await?;
        Ok(())
    }

    pub async fn send_player_action(&self, payload: PlayerActionPayload) -> Result<()> {
        self.manager.send(ClientEvent::PlayerAction(payload)).await?;
        Ok(())
    }

    pub async fn send_turn_change(&self, turn: serde_json::Value) -> Result<()> {
        self.manager
            .send(ClientEvent::TurnChange(
                tablebound_shared::TurnChangePayload { turn },
            ))
            .await?;
        Ok(())
    }

    pub async fn send_combat_update(&self, combat: serde_json::Value) -> Result<()> {
        self.manager
            .send(ClientEvent::CombatUpdate(
                tablebound_shared::CombatUpdatePayload { combat },
            ))
            .await?;
        Ok(())
    }

    // =========================================================================
    // Pending actions
    // =========================================================================

    /// Actions currently persisted and awaiting replay, across all stores.
    /// This is the one user-facing failure signal: a count that stays above
    /// zero means actions have been pending with no successful connection.
    pub async fn pending_count(&self) -> Result<u64> {
        Ok(self.queue.pending_count().await?)
    }

    /// Observe the pending total without polling.
    pub fn watch_pending(&self) -> watch::Receiver<u64> {
        self.queue.watch_pending()
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.coordinator_task.abort();
    }
}

// =============================================================================
// Live submitter
// =============================================================================

/// [`ActionSubmitter`] over the real transports: socket first for actions
/// with a wire event, REST otherwise; drains use the sync REST variants.
struct LiveSubmitter {
    manager: Arc<ConnectionManager>,
    api: ApiClient,
}

impl LiveSubmitter {
    async fn socket_send(
        &self,
        kind: ActionKind,
        payload: &serde_json::Value,
    ) -> Result<(), SubmitError> {
        let event = match kind {
            ActionKind::DiceRoll => {
                ClientEvent::DiceRoll(serde_json::from_value(payload.clone())?)
            }
            ActionKind::ChatMessage => {
                ClientEvent::ChatMessage(serde_json::from_value(payload.clone())?)
            }
            ActionKind::CharacterUpdate => {
                // No wire event for character edits; REST only.
                return Err(SubmitError::NotConnected);
            }
        };
        self.manager.send(event).await
    }

    async fn patch_character(&self, payload: &serde_json::Value) -> Result<(), SubmitError> {
        let character_id = payload["character_id"]
            .as_str()
            .ok_or_else(|| SubmitError::InvalidPayload("missing character_id".to_string()))?
            .to_string();
        self.api.patch_character(&character_id, payload).await
    }

    async fn rest_send(
        &self,
        kind: ActionKind,
        payload: &serde_json::Value,
    ) -> Result<(), SubmitError> {
        match kind {
            ActionKind::DiceRoll => self.api.post_dice_roll(payload).await,
            ActionKind::ChatMessage => self.api.post_message(payload).await,
            ActionKind::CharacterUpdate => self.patch_character(payload).await,
        }
    }
}

#[async_trait]
impl ActionSubmitter for LiveSubmitter {
    async fn submit(
        &self,
        kind: ActionKind,
        payload: &serde_json::Value,
    ) -> Result<(), SubmitError> {
        match kind {
            ActionKind::CharacterUpdate => self.patch_character(payload).await,
            ActionKind::DiceRoll | ActionKind::ChatMessage => {
                if self.manager.is_connected() {
                    match self.socket_send(kind, payload).await {
                        Ok(()) => return Ok(()),
                        Err(e) => {
                            tracing::warn!(error = %e, "socket send failed, trying REST fallback");
                        }
                    }
                }
                self.rest_send(kind, payload).await
            }
        }
    }

    async fn submit_queued(
        &self,
        kind: ActionKind,
        payload: &serde_json::Value,
    ) -> Result<(), SubmitError> {
        match kind {
            ActionKind::DiceRoll => self.api.sync_dice_roll(payload).await,
            ActionKind::ChatMessage => self.api.sync_message(payload).await,
            ActionKind::CharacterUpdate => self.patch_character(payload).await,
        }
    }
}
