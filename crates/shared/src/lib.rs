//! Tablebound Shared - wire protocol types for the game session boundary
//!
//! This crate contains every type that travels between the game server and the
//! session client:
//! - The WebSocket event envelope (`{ "event": ..., "data": ... }`)
//! - Typed event enums (`ClientEvent`, `ServerEvent`) and their payloads
//! - The connected-player roster entry (`Player`)
//! - Session target identifiers and socket URL construction
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - serde, serde_json, uuid, chrono, url, thiserror
//! 2. **No business logic** - pure data types and serialization
//! 3. **Forward compatible** - unknown event names decode without failing, so
//!    older clients tolerate server-side additions

pub mod events;
pub mod target;

// =============================================================================
// Event types
// =============================================================================
pub use events::{
    ChatMessagePayload,
    CharacterUpdatePayload,
    ClientEvent,
    CombatUpdatePayload,
    DecodedFrame,
    DiceRollPayload,
    EventKind,
    NarrationPayload,
    Player,
    PlayerActionPayload,
    ServerEvent,
    TurnChangePayload,
    decode_frame,
    encode_frame,
};

// =============================================================================
// Session target
// =============================================================================
pub use target::{SessionTarget, TargetError};
