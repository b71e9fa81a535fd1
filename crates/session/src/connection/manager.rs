//! Tokio driver for the session connection
//!
//! Owns the one live transport, feeds transport events into the pure state
//! machine, and executes the effects it returns. Reconnect delays come from
//! the injected [`BackoffPolicy`]; there is no attempt ceiling, the loop
//! retries until `close()`.
//!
//! All observable side effects (connected flag, roster, error callbacks) go
//! through the [`EventDispatcher`]; this type only moves frames and state.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

use tablebound_shared::{encode_frame, ClientEvent, SessionTarget};

use super::state::{transition, ConnectionInput, ConnectionState, Effect};
use crate::backoff::BackoffPolicy;
use crate::dispatch::EventDispatcher;
use crate::error::SubmitError;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Capacity of the outbound frame channel.
const WRITER_BUFFER: usize = 32;

/// Manages the lifecycle of one logical session connection.
pub struct ConnectionManager {
    ws_base: Url,
    backoff: Arc<dyn BackoffPolicy>,
    dispatcher: Arc<EventDispatcher>,
    state_tx: watch::Sender<ConnectionState>,
    /// Sender half of the live connection's outbound channel, if any.
    writer: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    /// Flips to true on `close()`; cancels the reconnect timer and the read
    /// loop at their next suspension point.
    close_tx: watch::Sender<bool>,
    /// Consecutive failed attempts since the last successful open.
    attempt: AtomicU32,
    supervisor: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(
        ws_base: Url,
        backoff: Arc<dyn BackoffPolicy>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (close_tx, _) = watch::channel(false);
        Self {
            ws_base,
            backoff,
            dispatcher,
            state_tx,
            writer: Mutex::new(None),
            close_tx,
            attempt: AtomicU32::new(0),
            supervisor: std::sync::Mutex::new(None),
        }
    }

    /// Run one input through the state machine, publish the new state, and
    /// return the effect for the caller to execute.
    fn apply(&self, input: ConnectionInput) -> Effect {
        let mut effect = Effect::None;
        self.state_tx.send_if_modified(|state| {
            let (next, eff) = transition(*state, input);
            effect = eff;
            if next == *state {
                false
            } else {
                tracing::debug!(from = ?state, to = ?next, ?input, "connection transition");
                *state = next;
                true
            }
        });
        self.dispatcher.connection_changed(self.state());
        effect
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// A receiver observing every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Start (or restart) the connection for `target`. Returns immediately;
    /// progress is observable through the state watch and the dispatcher
    /// callbacks. A prior connection attempt is discarded first.
    pub fn connect(self: Arc<Self>, target: SessionTarget) {
        let _ = self.close_tx.send(false);
        self.attempt.store(0, Ordering::SeqCst);
        self.apply(ConnectionInput::ConnectRequested);

        if let Ok(mut guard) = self.supervisor.lock() {
            if let Some(previous) = guard.take() {
                previous.abort();
            }
            let manager = Arc::clone(&self);
            *guard = Some(tokio::spawn(async move {
                manager.run_loop(target).await;
            }));
        }
    }

    /// Close intentionally: send a best-effort goodbye, cancel any pending
    /// reconnect, and drop the transport. No reconnect is scheduled.
    pub async fn close(&self, reason: Option<String>) {
        tracing::info!(?reason, "closing session connection");
        if let Some(tx) = self.writer.lock().await.clone() {
            let _ = tx.send(ClientEvent::Disconnect { reason }).await;
        }
        let _ = self.close_tx.send(true);
        self.apply(ConnectionInput::CloseRequested);
    }

    /// Queue one outbound event on the live connection.
    pub async fn send(&self, event: ClientEvent) -> Result<(), SubmitError> {
        let tx = self.writer.lock().await.clone();
        match tx {
            Some(tx) => tx
                .send(event)
                .await
                .map_err(|_| SubmitError::NotConnected),
            None => Err(SubmitError::NotConnected),
        }
    }

    /// Connect/reconnect loop. Runs until the machine settles in
    /// `Disconnected` (normal close or `close()`).
    async fn run_loop(self: Arc<Self>, target: SessionTarget) {
        let url = match target.socket_url(&self.ws_base) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, "invalid session target");
                self.dispatcher.emit_error(format!("invalid session target: {e}"));
                self.apply(ConnectionInput::CloseRequested);
                return;
            }
        };

        loop {
            let input = match connect_async(url.as_str()).await {
                Ok((stream, _)) => {
                    tracing::info!(session_id = %target.session_id, "connected to session server");
                    self.attempt.store(0, Ordering::SeqCst);
                    self.apply(ConnectionInput::TransportOpened);
                    self.run_connection(stream, &target).await
                }
                Err(e) => {
                    tracing::warn!(error = %e, "session connect failed");
                    self.dispatcher.emit_error(format!("connection failed: {e}"));
                    ConnectionInput::TransportError
                }
            };

            if self.apply(input) != Effect::ArmRetryTimer {
                return;
            }

            let attempt = self.attempt.fetch_add(1, Ordering::SeqCst);
            let delay = self.backoff.next_delay(attempt);
            tracing::info!(attempt = attempt + 1, ?delay, "reconnect scheduled");

            let mut close_rx = self.close_tx.subscribe();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = close_rx.changed() => {}
            }
            if *self.close_tx.borrow() {
                tracing::info!("reconnect cancelled by close()");
                return;
            }
            if self.apply(ConnectionInput::RetryTimerFired) != Effect::OpenTransport {
                return;
            }
        }
    }

    /// Drive one open transport until it drops. Returns the state-machine
    /// input describing how it ended.
    async fn run_connection(&self, stream: WsStream, target: &SessionTarget) -> ConnectionInput {
        let (mut write, mut read) = stream.split();
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WRITER_BUFFER);
        *self.writer.lock().await = Some(tx.clone());

        // Re-enter the room on every (re)connect; the server answers with a
        // fresh room_joined snapshot that rebuilds the roster.
        let join = ClientEvent::JoinRoom {
            session_id: target.session_id.clone(),
            user_id: target.user_id.clone(),
            character_id: target.character_id.clone(),
        };
        let _ = tx.send(join).await;

        let mut close_rx = self.close_tx.subscribe();
        let input = loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = self.dispatcher.dispatch(&text) {
                            let _ = tx.send(reply).await;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map(|f| u16::from(f.code));
                        tracing::info!(?code, "server closed connection");
                        break ConnectionInput::TransportClosed { code };
                    }
                    Some(Ok(_)) => {} // binary/ping/pong: tungstenite answers pings itself
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "transport error");
                        self.dispatcher.emit_error(format!("transport error: {e}"));
                        break ConnectionInput::TransportError;
                    }
                    None => break ConnectionInput::TransportClosed { code: None },
                },
                outbound = rx.recv() => match outbound {
                    Some(event) => match encode_frame(&event) {
                        Ok(json) => {
                            if let Err(e) = write.send(Message::Text(json)).await {
                                tracing::error!(error = %e, "failed to send frame");
                                break ConnectionInput::TransportError;
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "failed to encode frame"),
                    },
                    None => break ConnectionInput::TransportClosed { code: None },
                },
                _ = close_rx.changed() => {
                    if *close_rx.borrow() {
                        // Flush queued goodbyes, then close cleanly.
                        while let Ok(event) = rx.try_recv() {
                            if let Ok(json) = encode_frame(&event) {
                                let _ = write.send(Message::Text(json)).await;
                            }
                        }
                        let _ = write.send(Message::Close(None)).await;
                        break ConnectionInput::CloseRequested;
                    }
                }
            }
        };

        *self.writer.lock().await = None;
        input
    }
}
