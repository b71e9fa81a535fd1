//! Offline-first action durability
//!
//! Three named stores hold actions captured while disconnected, one per
//! action kind. Store and trigger names are part of the host contract and
//! must not change:
//!
//! | action            | store                     | background-sync trigger   |
//! |-------------------|---------------------------|---------------------------|
//! | dice roll         | `pendingRolls`            | `sync-dice-rolls`         |
//! | chat message      | `pendingMessages`         | `sync-chat-messages`      |
//! | character update  | `pendingCharacterUpdates` | `sync-character-updates`  |

mod memory;
mod queue;
mod sqlite;

pub use memory::MemoryStore;
pub use queue::{Ack, OfflineQueue};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use uuid::Uuid;

// =============================================================================
// Action kinds and queue names
// =============================================================================

/// The action kinds covered by the durability layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    DiceRoll,
    ChatMessage,
    CharacterUpdate,
}

impl ActionKind {
    /// The store this kind of action is persisted in while offline.
    pub fn queue(&self) -> QueueName {
        match self {
            ActionKind::DiceRoll => QueueName::PendingRolls,
            ActionKind::ChatMessage => QueueName::PendingMessages,
            ActionKind::CharacterUpdate => QueueName::PendingCharacterUpdates,
        }
    }
}

/// The named record stores of the persistent queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    PendingRolls,
    PendingMessages,
    PendingCharacterUpdates,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [
        QueueName::PendingRolls,
        QueueName::PendingMessages,
        QueueName::PendingCharacterUpdates,
    ];

    /// The store's persisted name.
    pub fn store_name(&self) -> &'static str {
        match self {
            QueueName::PendingRolls => "pendingRolls",
            QueueName::PendingMessages => "pendingMessages",
            QueueName::PendingCharacterUpdates => "pendingCharacterUpdates",
        }
    }

    /// The action kind drained from this store.
    pub fn action(&self) -> ActionKind {
        match self {
            QueueName::PendingRolls => ActionKind::DiceRoll,
            QueueName::PendingMessages => ActionKind::ChatMessage,
            QueueName::PendingCharacterUpdates => ActionKind::CharacterUpdate,
        }
    }

    /// The background-sync trigger registered when an entry lands here.
    pub fn trigger(&self) -> SyncTrigger {
        match self {
            QueueName::PendingRolls => SyncTrigger::DiceRolls,
            QueueName::PendingMessages => SyncTrigger::ChatMessages,
            QueueName::PendingCharacterUpdates => SyncTrigger::CharacterUpdates,
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.store_name())
    }
}

/// Background-sync trigger names registered with the host scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTrigger {
    DiceRolls,
    ChatMessages,
    CharacterUpdates,
}

impl SyncTrigger {
    /// The trigger's registered name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::DiceRolls => "sync-dice-rolls",
            SyncTrigger::ChatMessages => "sync-chat-messages",
            SyncTrigger::CharacterUpdates => "sync-character-updates",
        }
    }

    /// The store this trigger drains.
    pub fn queue(&self) -> QueueName {
        match self {
            SyncTrigger::DiceRolls => QueueName::PendingRolls,
            SyncTrigger::ChatMessages => QueueName::PendingMessages,
            SyncTrigger::CharacterUpdates => QueueName::PendingCharacterUpdates,
        }
    }
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Stored entries
// =============================================================================

/// One persisted action awaiting submission.
///
/// `id` is store-assigned and strictly increasing within a queue; drains
/// replay entries in `id` order. The `idempotency_key` travels inside the
/// replayed payload so the server can deduplicate at-least-once delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub id: i64,
    pub payload: serde_json::Value,
    pub idempotency_key: Uuid,
    pub enqueued_at: DateTime<Utc>,
}

impl StoredEntry {
    /// The payload as replayed during a drain: the entry's idempotency key
    /// embedded so the server can recognize a duplicate delivery.
    pub fn payload_with_key(&self) -> serde_json::Value {
        let mut payload = self.payload.clone();
        if let Some(object) = payload.as_object_mut() {
            object.insert(
                "idempotency_key".to_string(),
                serde_json::Value::String(self.idempotency_key.to_string()),
            );
        }
        payload
    }
}
