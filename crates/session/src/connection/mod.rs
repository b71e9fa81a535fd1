//! Session connection lifecycle
//!
//! Split into a pure state machine ([`state`]) and the tokio driver that
//! executes its effects ([`manager`]).

mod manager;
mod state;

pub use manager::ConnectionManager;
pub use state::{transition, ConnectionInput, ConnectionState, Effect, NORMAL_CLOSE_CODE};
