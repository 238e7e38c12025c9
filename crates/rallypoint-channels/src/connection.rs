//! Real-time socket lifecycle.
//!
//! One [`Connection`] owns the one WebSocket a session is allowed: the state
//! machine is explicit, a second `connect` on a live connection is rejected
//! instead of silently replacing the socket, and an unexpected close enters
//! a reconnect loop with exponential backoff and jitter.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use rallypoint_core::FrameSink;

use crate::config::{RealtimeConfig, ReconnectConfig};
use crate::error::{Error, Result};

/// Lifecycle of the session's socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connect attempt yet
    Idle,
    /// Dialing (first attempt)
    Connecting,
    /// Socket established; sends are transmitted
    Open,
    /// Lost unexpectedly; backoff delay before the next attempt
    Reconnecting,
    /// Terminal: closed explicitly or retries exhausted
    Closed,
}

impl ConnectionState {
    /// String form for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The session's one real-time transport.
///
/// Send semantics are at-most-once: [`FrameSink::send_frame`] transmits only
/// while the state is `Open`, otherwise the payload is dropped silently.
/// `Closed` is terminal for this value — a fresh session builds a fresh
/// `Connection`.
pub struct Connection {
    config: RealtimeConfig,
    id: Uuid,
    state: Arc<watch::Sender<ConnectionState>>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    cancel: CancellationToken,
}

impl Connection {
    /// Create an idle connection.
    #[must_use]
    pub fn new(config: RealtimeConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            config,
            id: Uuid::new_v4(),
            state: Arc::new(state),
            outbound: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Open the socket for the given user and start the supervised run loop.
    ///
    /// Returns the inbound raw-frame stream, handed out exactly once. Any
    /// call after the first is [`Error::AlreadyConnected`]: a second connect
    /// must never silently replace a live socket and leak its callbacks.
    pub fn connect(&self, user_id: &str) -> Result<mpsc::Receiver<String>> {
        if self.state() != ConnectionState::Idle {
            return Err(Error::AlreadyConnected);
        }

        let mut url = Url::parse(&self.config.endpoint)?;
        url.query_pairs_mut().append_pair("user_id", user_id);

        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.send_queue.max(1));
        {
            let mut guard = self.outbound.lock().unwrap_or_else(|e| e.into_inner());
            *guard = Some(outbound_tx);
        }

        self.state.send_replace(ConnectionState::Connecting);
        info!(connection = %self.id, user_id, "connecting {url}");

        tokio::spawn(run_loop(
            url.to_string(),
            self.id,
            self.config.reconnect.clone(),
            Arc::clone(&self.state),
            self.cancel.clone(),
            inbound_tx,
            outbound_rx,
        ));

        Ok(inbound_rx)
    }

    /// Close the socket. Terminal; idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
        self.state.send_replace(ConnectionState::Closed);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl FrameSink for Connection {
    async fn send_frame(&self, payload: String) -> bool {
        if self.state() != ConnectionState::Open {
            debug!(connection = %self.id, state = %self.state(), "frame dropped: transport not open");
            return false;
        }
        let sender = {
            let guard = self.outbound.lock().unwrap_or_else(|e| e.into_inner());
            guard.clone()
        };
        match sender {
            Some(tx) => match tx.try_send(payload) {
                Ok(()) => true,
                Err(e) => {
                    warn!(connection = %self.id, "frame dropped: outbound queue unavailable ({e})");
                    false
                }
            },
            None => false,
        }
    }

    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}

/// Supervised connect/read/write loop with reconnect-on-unexpected-close.
async fn run_loop(
    url: String,
    id: Uuid,
    reconnect: ReconnectConfig,
    state: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    inbound: mpsc::Sender<String>,
    mut outbound: mpsc::Receiver<String>,
) {
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            state.send_replace(ConnectionState::Closed);
            return;
        }

        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                attempt = 0;
                state.send_replace(ConnectionState::Open);
                info!(connection = %id, "socket open");

                let (mut sink, mut stream) = socket.split();
                let reason = loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = sink.send(WsMessage::Close(None)).await;
                            state.send_replace(ConnectionState::Closed);
                            info!(connection = %id, "socket closed by session");
                            return;
                        }
                        queued = outbound.recv() => match queued {
                            Some(payload) => {
                                if let Err(e) = sink.send(WsMessage::Text(payload)).await {
                                    break format!("send failed: {e}");
                                }
                            }
                            // Connection value dropped; nothing left to do.
                            None => {
                                state.send_replace(ConnectionState::Closed);
                                return;
                            }
                        },
                        frame = stream.next() => match frame {
                            Some(Ok(WsMessage::Text(text))) => {
                                if inbound.send(text).await.is_err() {
                                    // Consumer went away; stop the socket too.
                                    state.send_replace(ConnectionState::Closed);
                                    return;
                                }
                            }
                            Some(Ok(WsMessage::Close(_))) | None => break "remote close".to_string(),
                            Some(Ok(_)) => {} // ping/pong/binary carry no chat frames
                            Some(Err(e)) => break format!("socket error: {e}"),
                        },
                    }
                };
                warn!(connection = %id, "socket lost: {reason}");
            }
            Err(e) => {
                warn!(connection = %id, "connect failed: {e}");
            }
        }

        if cancel.is_cancelled() {
            state.send_replace(ConnectionState::Closed);
            return;
        }

        attempt += 1;
        if attempt > reconnect.max_attempts {
            error!(connection = %id, attempts = attempt - 1, "reconnect attempts exhausted");
            state.send_replace(ConnectionState::Closed);
            return;
        }

        state.send_replace(ConnectionState::Reconnecting);
        let delay = reconnect.delay_for(attempt);
        debug!(
            connection = %id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                state.send_replace(ConnectionState::Closed);
                return;
            }
            () = sleep(delay) => {}
        }
        state.send_replace(ConnectionState::Connecting);
    }
}
