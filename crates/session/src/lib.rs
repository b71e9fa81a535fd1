//! Tablebound Session - the client-side real-time session layer
//!
//! Keeps a client's view of a shared game session consistent with the server
//! despite unreliable connectivity, and guarantees that user actions (dice
//! rolls, chat, character edits) are never silently lost when the network
//! drops.
//!
//! Two responsibilities:
//! - a WebSocket protocol client with an explicit connect/reconnect state
//!   machine ([`connection`]) and typed event dispatch ([`dispatch`])
//! - an offline-first durability layer ([`offline`]) that persists outgoing
//!   actions while disconnected and replays them once connectivity or a
//!   background-sync trigger returns ([`sync`])
//!
//! UI code talks to [`SessionClient`] only: register callbacks per event
//! kind, call the send methods, observe `pending_count`. The server stays
//! authoritative; this crate only mirrors its state.
//!
//! Ambient capabilities (connectivity, durable storage, host scheduling) are
//! injected as the traits in [`ports`], so tests run against in-memory fakes
//! and non-browser targets can bring their own backends.

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod offline;
pub mod ports;
pub mod rest;
pub mod sync;

// =============================================================================
// Facade
// =============================================================================
pub use client::SessionClient;
pub use config::SessionConfig;

// =============================================================================
// Connection
// =============================================================================
pub use backoff::{BackoffPolicy, ExponentialBackoff, FixedDelay};
pub use connection::{ConnectionManager, ConnectionState, NORMAL_CLOSE_CODE};

// =============================================================================
// Dispatch
// =============================================================================
pub use dispatch::EventDispatcher;

// =============================================================================
// Offline durability
// =============================================================================
pub use error::{ActionError, StoreError, SubmitError};
pub use offline::{
    Ack, ActionKind, MemoryStore, OfflineQueue, QueueName, SqliteStore, StoredEntry, SyncTrigger,
};
pub use ports::{ActionSubmitter, ConnectivityProbe, DurableQueue, SyncScheduler};
pub use sync::{SyncCoordinator, TokioScheduler};

// Re-export the wire types collaborators need to construct payloads and
// handle events.
pub use tablebound_shared::{
    ChatMessagePayload, CharacterUpdatePayload, DiceRollPayload, EventKind, NarrationPayload,
    Player, PlayerActionPayload, ServerEvent, SessionTarget,
};
