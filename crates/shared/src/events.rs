//! WebSocket event types for server-client session communication
//!
//! Every frame on the session socket is a JSON envelope of the shape
//! `{ "event": "<name>", "data": { ... } }`, in both directions. This module
//! defines the closed set of event names, the typed payloads behind them, and
//! the two-step decode that keeps unknown-but-well-formed events distinguishable
//! from malformed frames.
//!
//! ## Versioning Policy
//!
//! - New event names can be added server-side at any time (forward compatible):
//!   clients decode them as [`DecodedFrame::Unknown`] and must ignore them
//! - Removing or renaming an event name is a breaking change
//! - Payload fields may be added if marked `#[serde(default)]`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Player
// =============================================================================

/// One entry in the connected-player roster.
///
/// The roster is derived state owned by the event dispatcher; the server is
/// authoritative and re-sends the full list on `room_joined` / `player_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default)]
    pub is_dm: bool,
    pub connected_at: DateTime<Utc>,
}

// =============================================================================
// Event names
// =============================================================================

/// The closed set of event names used on the wire.
///
/// Wire strings are snake_case (`"dice_roll"`, `"room_joined"`, ...). Both
/// directions draw from this one set; each direction uses its own subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connect,
    Disconnect,
    JoinRoom,
    LeaveRoom,
    RoomJoined,
    RoomLeft,
    PlayerJoined,
    PlayerLeft,
    PlayerList,
    DiceRoll,
    ChatMessage,
    DmNarration,
    PlayerAction,
    TurnChange,
    CombatUpdate,
    Error,
    Ping,
    Pong,
}

impl EventKind {
    /// The exact string used in the envelope's `event` field.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::JoinRoom => "join_room",
            EventKind::LeaveRoom => "leave_room",
            EventKind::RoomJoined => "room_joined",
            EventKind::RoomLeft => "room_left",
            EventKind::PlayerJoined => "player_joined",
            EventKind::PlayerLeft => "player_left",
            EventKind::PlayerList => "player_list",
            EventKind::DiceRoll => "dice_roll",
            EventKind::ChatMessage => "chat_message",
            EventKind::DmNarration => "dm_narration",
            EventKind::PlayerAction => "player_action",
            EventKind::TurnChange => "turn_change",
            EventKind::CombatUpdate => "combat_update",
            EventKind::Error => "error",
            EventKind::Ping => "ping",
            EventKind::Pong => "pong",
        }
    }

    /// Parse a wire string into a known event name. `None` means the name is
    /// not part of this client's protocol version.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "connect" => Some(EventKind::Connect),
            "disconnect" => Some(EventKind::Disconnect),
            "join_room" => Some(EventKind::JoinRoom),
            "leave_room" => Some(EventKind::LeaveRoom),
            "room_joined" => Some(EventKind::RoomJoined),
            "room_left" => Some(EventKind::RoomLeft),
            "player_joined" => Some(EventKind::PlayerJoined),
            "player_left" => Some(EventKind::PlayerLeft),
            "player_list" => Some(EventKind::PlayerList),
            "dice_roll" => Some(EventKind::DiceRoll),
            "chat_message" => Some(EventKind::ChatMessage),
            "dm_narration" => Some(EventKind::DmNarration),
            "player_action" => Some(EventKind::PlayerAction),
            "turn_change" => Some(EventKind::TurnChange),
            "combat_update" => Some(EventKind::CombatUpdate),
            "error" => Some(EventKind::Error),
            "ping" => Some(EventKind::Ping),
            "pong" => Some(EventKind::Pong),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

// =============================================================================
// Action payloads (Client -> Server, also the queued-entry payload shapes)
// =============================================================================

/// A dice roll submitted by the local player.
///
/// `idempotency_key` is absent on immediate sends and injected by the offline
/// queue when the action is persisted, so the server can deduplicate replays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceRollPayload {
    /// Dice formula, e.g. `"2d6+3"`. The client does not compute results.
    pub formula: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<Uuid>,
}

/// A chat message submitted by the local player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<Uuid>,
}

/// DM narration text (DM only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationPayload {
    pub narration: String,
}

/// A freeform player action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerActionPayload {
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<String>,
}

/// Turn-order change (DM only). The turn structure is owned by the server;
/// the client passes it through opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnChangePayload {
    pub turn: serde_json::Value,
}

/// Combat state update (DM only). Opaque to the session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatUpdatePayload {
    pub combat: serde_json::Value,
}

/// A partial character edit, applied server-side via
/// `PATCH /api/characters/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterUpdatePayload {
    pub character_id: String,
    /// Field patch, opaque to the session layer.
    pub updates: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<Uuid>,
}

// =============================================================================
// Client -> Server events
// =============================================================================

/// Messages from the session client to the server.
///
/// `#[serde(tag = "event", content = "data")]` produces the wire envelope
/// directly: `{ "event": "chat_message", "data": { "message": "..." } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Enter the room named in the socket URL. Sent automatically after every
    /// (re)connect so the server answers with a fresh `room_joined` snapshot.
    JoinRoom {
        session_id: String,
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        character_id: Option<String>,
    },
    /// Leave the room without closing the socket.
    LeaveRoom,
    /// Graceful goodbye before an intentional close.
    Disconnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    DiceRoll(DiceRollPayload),
    ChatMessage(ChatMessagePayload),
    DmNarration(NarrationPayload),
    PlayerAction(PlayerActionPayload),
    TurnChange(TurnChangePayload),
    CombatUpdate(CombatUpdatePayload),
    Ping,
    Pong,
}

// =============================================================================
// Server -> Client events
// =============================================================================

/// Messages from the server to the session client.
///
/// Dispatch over this enum is an exhaustive match: adding a variant here forces
/// every handler site to decide what to do with it at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Connection-level greeting; informational only.
    Connect,
    /// Server-initiated goodbye; the close frame carries the real close code.
    Disconnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Authoritative roster snapshot after a successful room join.
    RoomJoined {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        players: Vec<Player>,
    },
    /// Acknowledgement of `leave_room`.
    RoomLeft,
    PlayerJoined {
        player: Player,
    },
    PlayerLeft {
        player: Player,
    },
    /// Authoritative roster refresh outside of a join.
    PlayerList {
        players: Vec<Player>,
    },
    /// Another player's dice result, computed server-side.
    DiceRoll {
        user_id: String,
        username: String,
        formula: String,
        rolls: Vec<i64>,
        total: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        purpose: Option<String>,
    },
    ChatMessage {
        user_id: String,
        username: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    DmNarration {
        narration: String,
    },
    PlayerAction {
        user_id: String,
        username: String,
        #[serde(flatten)]
        action: PlayerActionPayload,
    },
    TurnChange {
        turn: serde_json::Value,
    },
    CombatUpdate {
        combat: serde_json::Value,
    },
    /// Application-level error; the connection stays open.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    Ping,
    Pong,
}

impl ServerEvent {
    /// The event name this variant travels under.
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Connect => EventKind::Connect,
            ServerEvent::Disconnect { .. } => EventKind::Disconnect,
            ServerEvent::RoomJoined { .. } => EventKind::RoomJoined,
            ServerEvent::RoomLeft => EventKind::RoomLeft,
            ServerEvent::PlayerJoined { .. } => EventKind::PlayerJoined,
            ServerEvent::PlayerLeft { .. } => EventKind::PlayerLeft,
            ServerEvent::PlayerList { .. } => EventKind::PlayerList,
            ServerEvent::DiceRoll { .. } => EventKind::DiceRoll,
            ServerEvent::ChatMessage { .. } => EventKind::ChatMessage,
            ServerEvent::DmNarration { .. } => EventKind::DmNarration,
            ServerEvent::PlayerAction { .. } => EventKind::PlayerAction,
            ServerEvent::TurnChange { .. } => EventKind::TurnChange,
            ServerEvent::CombatUpdate { .. } => EventKind::CombatUpdate,
            ServerEvent::Error { .. } => EventKind::Error,
            ServerEvent::Ping => EventKind::Ping,
            ServerEvent::Pong => EventKind::Pong,
        }
    }
}

// =============================================================================
// Frame encode/decode
// =============================================================================

/// Raw envelope used for the first decode step. Keeping this step separate
/// lets the dispatcher tell "unknown event name" apart from "malformed JSON".
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Outcome of decoding one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// A well-formed event this protocol version understands.
    Event(ServerEvent),
    /// Well-formed envelope, but the event name is newer than this client.
    /// Callers must log and ignore it.
    Unknown { event: String },
}

/// Decode one inbound text frame.
///
/// # Errors
/// Returns the underlying serde error when the frame is not a valid envelope,
/// or when a known event name carries a payload of the wrong shape.
pub fn decode_frame(text: &str) -> Result<DecodedFrame, serde_json::Error> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    if EventKind::from_wire(&raw.event).is_none() {
        return Ok(DecodedFrame::Unknown { event: raw.event });
    }
    let event = serde_json::from_value(serde_json::json!({
        "event": raw.event,
        "data": raw.data,
    }))?;
    Ok(DecodedFrame::Event(event))
}

/// Encode an outbound event as a text frame.
///
/// # Errors
/// Returns the underlying serde error if the payload cannot be serialized
/// (practically unreachable for these types).
pub fn encode_frame(event: &ClientEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    //! The envelope shape is a compatibility contract with the server; these
    //! tests pin the exact JSON produced and accepted.

    use super::*;
    use chrono::TimeZone;

    fn player(user_id: &str) -> Player {
        Player {
            user_id: user_id.to_string(),
            username: format!("user-{user_id}"),
            character_id: None,
            character_name: None,
            is_dm: false,
            connected_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid date"),
        }
    }

    #[test]
    fn test_chat_message_wire_shape() {
        let event = ClientEvent::ChatMessage(ChatMessagePayload {
            message: "hello".to_string(),
            idempotency_key: None,
        });
        let json: serde_json::Value =
            serde_json::from_str(&encode_frame(&event).expect("encode")).expect("json");

        assert_eq!(json["event"], "chat_message");
        assert_eq!(json["data"]["message"], "hello");
        // Absent idempotency key must not appear on the wire.
        assert!(json["data"].get("idempotency_key").is_none());
    }

    #[test]
    fn test_join_room_wire_shape() {
        let event = ClientEvent::JoinRoom {
            session_id: "sess-1".to_string(),
            user_id: "u-1".to_string(),
            character_id: Some("char-9".to_string()),
        };
        let json: serde_json::Value =
            serde_json::from_str(&encode_frame(&event).expect("encode")).expect("json");

        assert_eq!(json["event"], "join_room");
        assert_eq!(json["data"]["session_id"], "sess-1");
        assert_eq!(json["data"]["user_id"], "u-1");
        assert_eq!(json["data"]["character_id"], "char-9");
    }

    #[test]
    fn test_unit_event_has_no_data() {
        let json: serde_json::Value =
            serde_json::from_str(&encode_frame(&ClientEvent::Ping).expect("encode"))
                .expect("json");
        assert_eq!(json["event"], "ping");
    }

    #[test]
    fn test_decode_room_joined_snapshot() {
        let frame = serde_json::json!({
            "event": "room_joined",
            "data": {
                "session_id": "sess-1",
                "players": [player("a"), player("b")],
            }
        })
        .to_string();

        match decode_frame(&frame).expect("decode") {
            DecodedFrame::Event(ServerEvent::RoomJoined { players, .. }) => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[0].user_id, "a");
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_player_left_carries_user_id() {
        let frame = serde_json::json!({
            "event": "player_left",
            "data": { "player": player("gone") }
        })
        .to_string();

        match decode_frame(&frame).expect("decode") {
            DecodedFrame::Event(ServerEvent::PlayerLeft { player }) => {
                assert_eq!(player.user_id, "gone");
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_event_is_not_an_error() {
        let frame = r#"{"event": "holographic_terrain", "data": {"x": 1}}"#;
        match decode_frame(frame).expect("decode") {
            DecodedFrame::Unknown { event } => assert_eq!(event, "holographic_terrain"),
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_malformed_json_is_an_error() {
        assert!(decode_frame("not json at all").is_err());
    }

    #[test]
    fn test_decode_known_event_with_wrong_payload_is_an_error() {
        // player_joined requires data.player
        let frame = r#"{"event": "player_joined", "data": {"nope": true}}"#;
        assert!(decode_frame(frame).is_err());
    }

    #[test]
    fn test_decode_event_without_data_field() {
        // Unit events may omit "data" entirely.
        match decode_frame(r#"{"event": "pong"}"#).expect("decode") {
            DecodedFrame::Event(ServerEvent::Pong) => {}
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn test_server_event_round_trip() {
        let event = ServerEvent::DiceRoll {
            user_id: "u-1".to_string(),
            username: "Mira".to_string(),
            formula: "2d6+3".to_string(),
            rolls: vec![4, 6],
            total: 13,
            purpose: Some("stealth".to_string()),
        };
        let text = serde_json::to_string(&event).expect("encode");
        match decode_frame(&text).expect("decode") {
            DecodedFrame::Event(decoded) => assert_eq!(decoded, event),
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn test_event_kind_wire_strings_round_trip() {
        let kinds = [
            EventKind::Connect,
            EventKind::Disconnect,
            EventKind::JoinRoom,
            EventKind::LeaveRoom,
            EventKind::RoomJoined,
            EventKind::RoomLeft,
            EventKind::PlayerJoined,
            EventKind::PlayerLeft,
            EventKind::PlayerList,
            EventKind::DiceRoll,
            EventKind::ChatMessage,
            EventKind::DmNarration,
            EventKind::PlayerAction,
            EventKind::TurnChange,
            EventKind::CombatUpdate,
            EventKind::Error,
            EventKind::Ping,
            EventKind::Pong,
        ];
        for kind in kinds {
            assert_eq!(EventKind::from_wire(kind.as_wire_str()), Some(kind));
        }
        assert_eq!(EventKind::from_wire("no_such_event"), None);
    }

    #[test]
    fn test_server_event_kind_matches_wire_tag() {
        let event = ServerEvent::ChatMessage {
            user_id: "u".to_string(),
            username: "n".to_string(),
            message: "m".to_string(),
            timestamp: None,
        };
        let json: serde_json::Value = serde_json::to_value(&event).expect("encode");
        assert_eq!(json["event"], event.kind().as_wire_str());
    }
}
