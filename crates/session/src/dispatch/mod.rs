//! Inbound event dispatch and roster state

mod dispatcher;
mod roster;

pub use dispatcher::{ConnectedSignal, EventDispatcher};
pub use roster::Roster;
