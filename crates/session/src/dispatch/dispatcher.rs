//! Typed event dispatch
//!
//! Inbound text frames are decoded in two steps and routed to the handlers
//! registered per event kind. The dispatcher also owns the process-wide
//! observable state: the player roster and the connected flag. Nothing else
//! mutates either; the connection manager reports lifecycle changes here and
//! the dispatcher serializes the writes.
//!
//! Malformed frames and unknown event names are logged and dropped; the
//! protocol must tolerate server-side additions without breaking older
//! clients.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use tokio::sync::watch;

use tablebound_shared::{decode_frame, ClientEvent, DecodedFrame, EventKind, Player, ServerEvent};

use super::roster::Roster;
use crate::connection::ConnectionState;
use crate::ports::ConnectivityProbe;

type Handler = Box<dyn FnMut(ServerEvent) + Send + 'static>;

/// Decodes inbound frames, maintains the roster, and invokes registered
/// callbacks.
pub struct EventDispatcher {
    handlers: Mutex<HashMap<EventKind, Vec<Handler>>>,
    roster: RwLock<Roster>,
    connected_tx: watch::Sender<bool>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (connected_tx, _) = watch::channel(false);
        Self {
            handlers: Mutex::new(HashMap::new()),
            roster: RwLock::new(Roster::new()),
            connected_tx,
        }
    }

    /// Register a callback for one event kind. Multiple handlers per kind are
    /// allowed; they run in registration order.
    pub fn register(&self, kind: EventKind, handler: impl FnMut(ServerEvent) + Send + 'static) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.entry(kind).or_default().push(Box::new(handler));
        }
    }

    /// Decode and route one inbound frame. Returns the reply frame to send,
    /// if the event demands one (server `ping` -> `pong`).
    ///
    /// Never fails: decode problems are logged and the frame is dropped.
    pub fn dispatch(&self, raw_frame: &str) -> Option<ClientEvent> {
        let event = match decode_frame(raw_frame) {
            Ok(DecodedFrame::Event(event)) => event,
            Ok(DecodedFrame::Unknown { event }) => {
                tracing::warn!(event, "ignoring unknown event");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                return None;
            }
        };

        let reply = self.apply_state_effects(&event);
        self.invoke_handlers(&event);
        reply
    }

    /// Roster mutations and protocol replies, before handlers run.
    fn apply_state_effects(&self, event: &ServerEvent) -> Option<ClientEvent> {
        match event {
            ServerEvent::RoomJoined { players, .. } | ServerEvent::PlayerList { players } => {
                if let Ok(mut roster) = self.roster.write() {
                    roster.replace(players.clone());
                    tracing::debug!(count = roster.len(), "roster snapshot applied");
                }
            }
            ServerEvent::PlayerJoined { player } => {
                if let Ok(mut roster) = self.roster.write() {
                    if roster.upsert(player.clone()) {
                        tracing::warn!(user_id = %player.user_id, "duplicate player_joined replaced");
                    }
                }
            }
            ServerEvent::PlayerLeft { player } => {
                if let Ok(mut roster) = self.roster.write() {
                    roster.remove(&player.user_id);
                }
            }
            ServerEvent::Ping => return Some(ClientEvent::Pong),
            ServerEvent::Pong
            | ServerEvent::Connect
            | ServerEvent::Disconnect { .. }
            | ServerEvent::RoomLeft => {
                tracing::debug!(event = %event.kind(), "lifecycle event");
            }
            // Pure notifications: no local state change.
            ServerEvent::DiceRoll { .. }
            | ServerEvent::ChatMessage { .. }
            | ServerEvent::DmNarration { .. }
            | ServerEvent::PlayerAction { .. }
            | ServerEvent::TurnChange { .. }
            | ServerEvent::CombatUpdate { .. }
            | ServerEvent::Error { .. } => {}
        }
        None
    }

    fn invoke_handlers(&self, event: &ServerEvent) {
        if let Ok(mut handlers) = self.handlers.lock() {
            if let Some(registered) = handlers.get_mut(&event.kind()) {
                for handler in registered.iter_mut() {
                    handler(event.clone());
                }
            }
        }
    }

    /// Report a connection lifecycle change. Updates the connected flag and,
    /// on losing the transport, clears the roster (the reconnect's
    /// `room_joined` snapshot rebuilds it).
    pub fn connection_changed(&self, state: ConnectionState) {
        let connected = state == ConnectionState::Connected;
        let was_connected = *self.connected_tx.borrow();
        self.connected_tx.send_replace(connected);

        if was_connected && !connected {
            if let Ok(mut roster) = self.roster.write() {
                roster.clear();
            }
            self.invoke_handlers(&ServerEvent::Disconnect { reason: None });
        } else if !was_connected && connected {
            self.invoke_handlers(&ServerEvent::Connect);
        }
    }

    /// Surface a transport-level error to the registered error handlers.
    /// Errors never close the connection by themselves.
    pub fn emit_error(&self, message: impl Into<String>) {
        self.invoke_handlers(&ServerEvent::Error {
            message: message.into(),
            code: None,
        });
    }

    /// Current roster snapshot.
    pub fn roster(&self) -> Vec<Player> {
        self.roster
            .read()
            .map(|r| r.players().to_vec())
            .unwrap_or_default()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected_tx.borrow()
    }

    /// A connectivity signal bound to this dispatcher's connected flag.
    pub fn connected_signal(&self) -> ConnectedSignal {
        ConnectedSignal {
            rx: self.connected_tx.subscribe(),
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// [`ConnectivityProbe`] implementation backed by the dispatcher's connected
/// flag.
#[derive(Clone)]
pub struct ConnectedSignal {
    rx: watch::Receiver<bool>,
}

impl ConnectivityProbe for ConnectedSignal {
    fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn player_json(user_id: &str) -> serde_json::Value {
        serde_json::json!({
            "user_id": user_id,
            "username": format!("user-{user_id}"),
            "is_dm": false,
            "connected_at": Utc::now().to_rfc3339(),
        })
    }

    fn frame(event: &str, data: serde_json::Value) -> String {
        serde_json::json!({ "event": event, "data": data }).to_string()
    }

    #[test]
    fn test_room_joined_replaces_roster() {
        let dispatcher = EventDispatcher::new();
        dispatcher.dispatch(&frame(
            "room_joined",
            serde_json::json!({ "players": [player_json("a"), player_json("b")] }),
        ));

        let roster = dispatcher.roster();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].user_id, "a");
    }

    #[test]
    fn test_join_join_leave_yields_remaining_player() {
        let dispatcher = EventDispatcher::new();
        dispatcher.dispatch(&frame(
            "player_joined",
            serde_json::json!({ "player": player_json("a") }),
        ));
        dispatcher.dispatch(&frame(
            "player_joined",
            serde_json::json!({ "player": player_json("b") }),
        ));
        dispatcher.dispatch(&frame(
            "player_left",
            serde_json::json!({ "player": player_json("a") }),
        ));

        let roster = dispatcher.roster();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].user_id, "b");
    }

    #[test]
    fn test_duplicate_player_joined_does_not_grow_roster() {
        let dispatcher = EventDispatcher::new();
        let join = frame("player_joined", serde_json::json!({ "player": player_json("a") }));
        dispatcher.dispatch(&join);
        dispatcher.dispatch(&join);
        assert_eq!(dispatcher.roster().len(), 1);
    }

    #[test]
    fn test_notification_handlers_receive_event() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicU32::new(0));

        let count_clone = Arc::clone(&count);
        dispatcher.register(EventKind::ChatMessage, move |event| {
            if let ServerEvent::ChatMessage { message, .. } = event {
                assert_eq!(message, "hello");
                count_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        let chat = frame(
            "chat_message",
            serde_json::json!({ "user_id": "u", "username": "n", "message": "hello" }),
        );
        dispatcher.dispatch(&chat);
        // Notification dispatch is a pure forward: safe to deliver twice.
        dispatcher.dispatch(&chat);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_malformed_and_unknown_frames_are_dropped() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicU32::new(0));

        let count_clone = Arc::clone(&count);
        dispatcher.register(EventKind::Error, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(dispatcher.dispatch("{{{ not json").is_none());
        assert!(dispatcher
            .dispatch(&frame("brand_new_event", serde_json::json!({})))
            .is_none());
        // Neither reaches any handler, including error handlers.
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_error_event_is_forwarded_not_fatal() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicU32::new(0));

        let count_clone = Arc::clone(&count);
        dispatcher.register(EventKind::Error, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.connection_changed(ConnectionState::Connected);
        dispatcher.dispatch(&frame("error", serde_json::json!({ "message": "boom" })));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(dispatcher.is_connected());
    }

    #[test]
    fn test_server_ping_yields_pong_reply() {
        let dispatcher = EventDispatcher::new();
        let reply = dispatcher.dispatch(&frame("ping", serde_json::json!({})));
        assert_eq!(reply, Some(ClientEvent::Pong));
    }

    #[test]
    fn test_disconnect_clears_roster_and_flag() {
        let dispatcher = EventDispatcher::new();
        dispatcher.connection_changed(ConnectionState::Connected);
        dispatcher.dispatch(&frame(
            "room_joined",
            serde_json::json!({ "players": [player_json("a")] }),
        ));
        assert!(dispatcher.is_connected());
        assert_eq!(dispatcher.roster().len(), 1);

        dispatcher.connection_changed(ConnectionState::Reconnecting);

        assert!(!dispatcher.is_connected());
        assert!(dispatcher.roster().is_empty());
    }

    #[test]
    fn test_connected_signal_tracks_flag() {
        let dispatcher = EventDispatcher::new();
        let signal = dispatcher.connected_signal();
        assert!(!signal.is_online());

        dispatcher.connection_changed(ConnectionState::Connected);
        assert!(signal.is_online());
    }
}
