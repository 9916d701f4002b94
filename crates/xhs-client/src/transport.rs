//! WebSocket session with the backend.
//!
//! # Architecture
//!
//! [`connect`] spawns one task that exclusively owns the socket.  Decoded
//! frames and connection status changes flow to the caller through an
//! unbounded channel of [`TransportEvent`]s; outbound messages flow the
//! other way through a [`TransportHandle`].
//!
//! Reconnection is decided by [`ReconnectMachine::step`], a pure function
//! from `(state, event)` to `(state, effects)`.  The socket task only
//! performs the effects it returns.  The retry counter grows by one per
//! reconnect attempt, resets whenever a connection opens, and once the
//! bound is reached the task gives up for good.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::protocol::{InboundFrame, ServerEvent, decode_frame};
use crate::session::ClientId;

/// Upper bound on a single handshake, in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Reconnect state machine
// ---------------------------------------------------------------------------

/// Connection status as seen by the rest of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A handshake is in flight; `attempt` is zero for the first connect.
    Connecting { attempt: u32 },
    Open,
    /// Waiting out the delay before reconnect number `attempt`.
    Retrying { attempt: u32 },
    /// The retry bound was reached; no further attempts will be made.
    Exhausted,
    /// The session was shut down locally.
    Stopped,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting { attempt: 0 } => f.write_str("connecting"),
            Self::Connecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Open => f.write_str("connected"),
            Self::Retrying { attempt } => write!(f, "disconnected, retry {attempt} pending"),
            Self::Exhausted => f.write_str("disconnected"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Something that happened to the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The handshake succeeded.
    Opened,
    /// The handshake failed or an open connection dropped.
    Closed,
    /// The reconnect delay has elapsed.
    RetryElapsed,
    /// The owner asked the session to stop.
    Shutdown,
}

/// What the socket task must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Connect,
    ScheduleReconnect { delay: Duration, attempt: u32 },
    GiveUp,
}

/// Bounded, fixed-delay reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectMachine {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectMachine {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

impl ReconnectMachine {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            delay: config.reconnect_delay(),
        }
    }

    /// The state a fresh session starts in, and its first effect.
    pub fn start(&self) -> (ConnectionState, Vec<Effect>) {
        (ConnectionState::Connecting { attempt: 0 }, vec![Effect::Connect])
    }

    /// Advance the machine.  Events that make no sense in the current state
    /// leave it unchanged and produce no effects.
    pub fn step(&self, state: ConnectionState, event: LinkEvent) -> (ConnectionState, Vec<Effect>) {
        use ConnectionState as S;
        use LinkEvent as E;

        match (state, event) {
            (S::Stopped | S::Exhausted, _) => (state, Vec::new()),
            (_, E::Shutdown) => (S::Stopped, Vec::new()),
            (S::Connecting { .. }, E::Opened) => (S::Open, Vec::new()),
            (S::Open, E::Closed) => self.retry_or_give_up(0),
            (S::Connecting { attempt }, E::Closed) => self.retry_or_give_up(attempt),
            (S::Retrying { attempt }, E::RetryElapsed) => {
                (S::Connecting { attempt }, vec![Effect::Connect])
            }
            _ => (state, Vec::new()),
        }
    }

    fn retry_or_give_up(&self, attempts_made: u32) -> (ConnectionState, Vec<Effect>) {
        if attempts_made < self.max_attempts {
            let attempt = attempts_made + 1;
            (
                ConnectionState::Retrying { attempt },
                vec![Effect::ScheduleReconnect {
                    delay: self.delay,
                    attempt,
                }],
            )
        } else {
            (ConnectionState::Exhausted, vec![Effect::GiveUp])
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Delivered to the owner of the session, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Status(ConnectionState),
    Server(ServerEvent),
}

/// Owner's side of a running session.
///
/// Dropping the handle stops the socket task.
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<String>,
    state: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Send a JSON message if the connection is open.
    ///
    /// Nothing is queued: when the socket is not open the message is
    /// dropped with an error log and `false` is returned.
    pub fn send(&self, message: &Value) -> bool {
        let state = self.state();
        if !state.is_open() {
            error!(%state, "websocket not open, message dropped");
            return false;
        }
        match serde_json::to_string(message) {
            Ok(text) => self.outbound.send(text).is_ok(),
            Err(e) => {
                error!(error = %e, "failed to serialize outbound message");
                false
            }
        }
    }

    /// Close the socket and wait for the session task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "websocket task ended abnormally");
        }
    }
}

/// Open a session for `client_id` and start the socket task.
///
/// Must be called from within a tokio runtime.
pub fn connect(
    config: &ClientConfig,
    client_id: &ClientId,
) -> Result<(TransportHandle, mpsc::UnboundedReceiver<TransportEvent>)> {
    let url = config.ws_url(client_id)?;
    let machine = ReconnectMachine::from_config(config);

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting { attempt: 0 });
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    info!(url = %url, "starting websocket session");
    let session = Session {
        url,
        machine,
        state: ConnectionState::Connecting { attempt: 0 },
        outbound: outbound_rx,
        events: events_tx,
        state_tx,
        shutdown: shutdown_rx,
    };
    let task = tokio::spawn(session.run());

    let handle = TransportHandle {
        outbound: outbound_tx,
        state: state_rx,
        shutdown: shutdown_tx,
        task,
    };
    Ok((handle, events_rx))
}

// ---------------------------------------------------------------------------
// Socket task
// ---------------------------------------------------------------------------

/// Why a connected pump returned.
enum PumpEnd {
    Closed,
    Shutdown,
}

struct Session {
    url: Url,
    machine: ReconnectMachine,
    state: ConnectionState,
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: watch::Receiver<bool>,
}

impl Session {
    async fn run(mut self) {
        let (state, effects) = self.machine.start();
        self.publish(state);
        let mut pending: VecDeque<Effect> = effects.into();

        while let Some(effect) = pending.pop_front() {
            let event = match effect {
                Effect::Connect => self.connect_once().await,
                Effect::ScheduleReconnect { delay, attempt } => {
                    info!(attempt, max = self.machine.max_attempts, "reconnecting after delay");
                    tokio::select! {
                        _ = self.shutdown.changed() => LinkEvent::Shutdown,
                        _ = tokio::time::sleep(delay) => LinkEvent::RetryElapsed,
                    }
                }
                Effect::GiveUp => {
                    error!(
                        attempts = self.machine.max_attempts,
                        "websocket reconnect attempts exhausted, giving up"
                    );
                    break;
                }
            };
            pending.extend(self.apply(event));
        }
        debug!(state = %self.state, "websocket task finished");
    }

    /// Run one connection to completion and report how it ended.
    async fn connect_once(&mut self) -> LinkEvent {
        let handshake = tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            connect_async(self.url.as_str()),
        );
        let result = tokio::select! {
            _ = self.shutdown.changed() => return LinkEvent::Shutdown,
            result = handshake => result,
        };

        let stream = match result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                warn!(error = %e, "websocket connection failed");
                return LinkEvent::Closed;
            }
            Err(_) => {
                warn!(seconds = CONNECT_TIMEOUT_SECS, "websocket handshake timed out");
                return LinkEvent::Closed;
            }
        };

        // Anything sent while the previous connection was dying is stale.
        while self.outbound.try_recv().is_ok() {}

        self.apply(LinkEvent::Opened);
        info!(url = %self.url, "websocket connected");

        match self.pump(stream).await {
            PumpEnd::Closed => LinkEvent::Closed,
            PumpEnd::Shutdown => LinkEvent::Shutdown,
        }
    }

    async fn pump<S>(&mut self, stream: tokio_tungstenite::WebSocketStream<S>) -> PumpEnd
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut sink, mut source) = stream.split();
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpEnd::Shutdown;
                }
                outbound = self.outbound.recv() => {
                    let Some(text) = outbound else {
                        let _ = sink.send(Message::Close(None)).await;
                        return PumpEnd::Shutdown;
                    };
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        warn!(error = %e, "websocket send failed");
                        return PumpEnd::Closed;
                    }
                }
                inbound = source.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if !self.deliver(text.as_str()) {
                            return PumpEnd::Shutdown;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "websocket closed by server");
                        return PumpEnd::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket receive error");
                        return PumpEnd::Closed;
                    }
                    None => {
                        info!("websocket stream ended");
                        return PumpEnd::Closed;
                    }
                },
            }
        }
    }

    /// Decode one text frame and forward it.  Returns `false` once nobody
    /// is listening any more.
    fn deliver(&self, text: &str) -> bool {
        match decode_frame(text) {
            Ok(InboundFrame::Event(event)) => {
                debug!(kind = event.kind(), "frame received");
                self.events.send(TransportEvent::Server(event)).is_ok()
            }
            Ok(InboundFrame::Unknown(kind)) => {
                warn!(kind = %kind, "unknown message type, ignored");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to parse websocket frame");
                true
            }
        }
    }

    fn apply(&mut self, event: LinkEvent) -> Vec<Effect> {
        let (state, effects) = self.machine.step(self.state, event);
        if state != self.state {
            self.publish(state);
        }
        effects
    }

    fn publish(&mut self, state: ConnectionState) {
        self.state = state;
        let _ = self.state_tx.send(state);
        let _ = self.events.send(TransportEvent::Status(state));
    }
}
