//! Error types for the session layer
//!
//! The taxonomy follows how each failure is recovered:
//! - transport errors drive the reconnect machine and surface through the
//!   `error` event callback, never as return values from the read loop
//! - decode errors are logged and dropped inside the dispatcher
//! - storage and submission errors propagate to the immediate caller

use thiserror::Error;

/// Failures of the durable queue storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("queue storage failure: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("queue payload could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A stored row that no longer parses. The row is reported, not wiped;
    /// the store never destroys data on read.
    #[error("corrupt queue entry {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Failures submitting one action to the server.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("not connected")]
    NotConnected,

    #[error("transport send failed: {0}")]
    Transport(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected submission with status {status}")]
    Rejected { status: u16 },

    #[error("submission payload is invalid: {0}")]
    InvalidPayload(String),

    #[error("payload could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures of a queued-action submission: either the send itself, or the
/// durability layer backing it.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
