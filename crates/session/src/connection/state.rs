//! Connection state machine
//!
//! The machine is pure: [`transition`] maps (state, input) to (state, effect)
//! and nothing else touches the state value. The tokio driver in
//! [`manager`](super::manager) feeds it transport events and executes the
//! returned effects, which keeps every close-code edge testable without a
//! socket.

use serde::{Deserialize, Serialize};

/// The WebSocket normal-closure code. Any other close code means the drop
/// was not intentional and a reconnect is scheduled.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Lifecycle state of the one logical session connection.
///
/// There is no failure state: short of an explicit `close()`, the machine
/// keeps retrying and a prolonged outage surfaces through the pending-count
/// observable instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Everything that can happen to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionInput {
    /// `connect()` was called.
    ConnectRequested,
    /// The transport finished its handshake.
    TransportOpened,
    /// The transport closed; `code` is the close frame's code if one arrived.
    TransportClosed { code: Option<u16> },
    /// The transport failed (refused, reset, protocol error).
    TransportError,
    /// The armed reconnect timer fired.
    RetryTimerFired,
    /// `close()` was called.
    CloseRequested,
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Discard any prior transport handle and open a new one.
    OpenTransport,
    /// Arm exactly one reconnect timer.
    ArmRetryTimer,
    /// Cancel any pending timer, drop the transport, stop for good.
    Teardown,
}

/// Apply one input. Inputs that do not apply in the current state (a stale
/// timer, a close event from an already-discarded transport) are ignored.
pub fn transition(state: ConnectionState, input: ConnectionInput) -> (ConnectionState, Effect) {
    use ConnectionInput as In;
    use ConnectionState as St;

    match (state, input) {
        // connect() always wins: any prior transport is discarded first.
        (_, In::ConnectRequested) => (St::Connecting, Effect::OpenTransport),
        (_, In::CloseRequested) => (St::Disconnected, Effect::Teardown),

        (St::Connecting, In::TransportOpened) => (St::Connected, Effect::None),

        // An intentional close code ends the session; anything else retries.
        (St::Connected | St::Connecting, In::TransportClosed { code })
            if code == Some(NORMAL_CLOSE_CODE) =>
        {
            (St::Disconnected, Effect::None)
        }
        (St::Connected | St::Connecting, In::TransportClosed { .. } | In::TransportError) => {
            (St::Reconnecting, Effect::ArmRetryTimer)
        }

        (St::Reconnecting, In::RetryTimerFired) => (St::Connecting, Effect::OpenTransport),

        // Stale or out-of-order inputs.
        (state, _) => (state, Effect::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_from_disconnected() {
        let (state, effect) =
            transition(ConnectionState::Disconnected, ConnectionInput::ConnectRequested);
        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!(effect, Effect::OpenTransport);
    }

    #[test]
    fn test_open_completes_the_handshake() {
        let (state, effect) =
            transition(ConnectionState::Connecting, ConnectionInput::TransportOpened);
        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(effect, Effect::None);
    }

    #[test]
    fn test_normal_close_does_not_reconnect() {
        let (state, effect) = transition(
            ConnectionState::Connected,
            ConnectionInput::TransportClosed {
                code: Some(NORMAL_CLOSE_CODE),
            },
        );
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(effect, Effect::None);
    }

    #[test]
    fn test_every_abnormal_close_code_arms_one_retry() {
        for code in [None, Some(1001), Some(1006), Some(1011), Some(4000)] {
            let (state, effect) = transition(
                ConnectionState::Connected,
                ConnectionInput::TransportClosed { code },
            );
            assert_eq!(state, ConnectionState::Reconnecting, "code {code:?}");
            assert_eq!(effect, Effect::ArmRetryTimer, "code {code:?}");
        }
    }

    #[test]
    fn test_error_during_handshake_arms_retry() {
        let (state, effect) =
            transition(ConnectionState::Connecting, ConnectionInput::TransportError);
        assert_eq!(state, ConnectionState::Reconnecting);
        assert_eq!(effect, Effect::ArmRetryTimer);
    }

    #[test]
    fn test_repeated_errors_do_not_arm_a_second_timer() {
        let (state, effect) =
            transition(ConnectionState::Reconnecting, ConnectionInput::TransportError);
        assert_eq!(state, ConnectionState::Reconnecting);
        assert_eq!(effect, Effect::None);
    }

    #[test]
    fn test_timer_fire_reopens_transport() {
        let (state, effect) =
            transition(ConnectionState::Reconnecting, ConnectionInput::RetryTimerFired);
        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!(effect, Effect::OpenTransport);
    }

    #[test]
    fn test_close_is_terminal_from_every_state() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
        ] {
            let (next, effect) = transition(state, ConnectionInput::CloseRequested);
            assert_eq!(next, ConnectionState::Disconnected);
            assert_eq!(effect, Effect::Teardown);
        }
    }

    #[test]
    fn test_close_cancels_a_pending_retry() {
        // Reconnecting -> close: teardown, and a later stale timer fire is inert.
        let (state, effect) =
            transition(ConnectionState::Reconnecting, ConnectionInput::CloseRequested);
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(effect, Effect::Teardown);

        let (state, effect) = transition(state, ConnectionInput::RetryTimerFired);
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(effect, Effect::None);
    }

    #[test]
    fn test_stale_transport_close_after_disconnect_is_ignored() {
        let (state, effect) = transition(
            ConnectionState::Disconnected,
            ConnectionInput::TransportClosed { code: Some(1006) },
        );
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(effect, Effect::None);
    }

    #[test]
    fn test_reconnect_while_connected_reopens_transport() {
        // connect() during an active session discards the live transport.
        let (state, effect) =
            transition(ConnectionState::Connected, ConnectionInput::ConnectRequested);
        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!(effect, Effect::OpenTransport);
    }
}
