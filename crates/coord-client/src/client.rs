use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use coord_core::errors::ClientError;
use coord_core::events::{reserved, EventType};
use coord_core::frames::{ControlFrame, ServerFrame};
use coord_core::ids::{AgentId, ClientId, SessionId};

use crate::config::ClientConfig;
use crate::dispatch::{HandlerId, ListenerRegistry};
use crate::endpoint::Endpoint;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle state of a [`RealtimeClient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    /// Clean server close. A later `connect()` restarts the machine.
    Disconnected,
    /// Explicit `disconnect()` or exhausted reconnects. Terminal.
    Terminated,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Terminated => "terminated",
        }
    }
}

/// How a socket session ended, mirroring the close code and reason handed to
/// `disconnect` listeners.
struct CloseOutcome {
    code: u16,
    reason: String,
    clean: bool,
}

impl CloseOutcome {
    fn unclean(reason: impl Into<String>) -> Self {
        // 1006: abnormal closure, no close handshake.
        Self {
            code: 1006,
            reason: reason.into(),
            clean: false,
        }
    }
}

struct Shared {
    base_url: String,
    endpoint: Endpoint,
    config: ClientConfig,
    state: RwLock<ConnectionState>,
    /// Server-assigned (or caller-supplied) identity, reused on reconnects.
    client_id: RwLock<Option<ClientId>>,
    subscriptions: RwLock<BTreeSet<String>>,
    listeners: ListenerRegistry,
    /// Bumped by `connect()` and `disconnect()`; socket tasks check their
    /// generation before touching state so a superseded socket can never
    /// emit events or schedule reconnects.
    generation: AtomicU64,
    reconnect_attempts: AtomicU32,
    outbound: RwLock<Option<mpsc::UnboundedSender<Message>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// Realtime WebSocket client for one coordinator session.
///
/// Cheap to clone; clones share the same connection and listener registry.
#[derive(Clone)]
pub struct RealtimeClient {
    shared: Arc<Shared>,
}

impl RealtimeClient {
    /// Client for the general session channel.
    pub fn session(
        base_url: impl Into<String>,
        session_id: SessionId,
        config: ClientConfig,
    ) -> Self {
        Self::with_endpoint(base_url, Endpoint::Session(session_id), config)
    }

    /// Client for the visualization channel. Always subscribes to the task
    /// and session status events the visualizations consume.
    pub fn visualization(
        base_url: impl Into<String>,
        session_id: SessionId,
        mut config: ClientConfig,
    ) -> Self {
        merge_subscriptions(&mut config, EventType::VISUALIZATION);
        Self::with_endpoint(base_url, Endpoint::Visualization(session_id), config)
    }

    /// Client monitoring a single agent. Always subscribes to the agent
    /// activity events.
    pub fn agent(
        base_url: impl Into<String>,
        session_id: SessionId,
        agent_id: AgentId,
        mut config: ClientConfig,
    ) -> Self {
        merge_subscriptions(&mut config, EventType::AGENT_MONITOR);
        Self::with_endpoint(base_url, Endpoint::Agent(session_id, agent_id), config)
    }

    pub fn with_endpoint(
        base_url: impl Into<String>,
        endpoint: Endpoint,
        config: ClientConfig,
    ) -> Self {
        let subscriptions: BTreeSet<String> = config
            .subscriptions
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect();
        let client_id = config.client_id.clone();

        Self {
            shared: Arc::new(Shared {
                base_url: base_url.into(),
                endpoint,
                config,
                state: RwLock::new(ConnectionState::Idle),
                client_id: RwLock::new(client_id),
                subscriptions: RwLock::new(subscriptions),
                listeners: ListenerRegistry::new(),
                generation: AtomicU64::new(0),
                reconnect_attempts: AtomicU32::new(0),
                outbound: RwLock::new(None),
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Open the connection. Resolves `Ok` on the first successful open, or an
    /// error once the bounded retry loop is exhausted. A no-op returning `Ok`
    /// while a connection is already live or pending.
    pub async fn connect(&self) -> Result<(), ClientError> {
        // State transition and generation bump happen under one lock so a
        // concurrent disconnect() cannot interleave between them and leave a
        // supervisor holding a still-current generation.
        let generation = {
            let mut state = self.shared.state.write();
            match *state {
                ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Reconnecting => return Ok(()),
                ConnectionState::Terminated => return Err(ClientError::Terminated),
                ConnectionState::Idle | ConnectionState::Disconnected => {
                    *state = ConnectionState::Connecting;
                }
            }
            self.shared.generation.fetch_add(1, Ordering::Relaxed) + 1
        };

        self.shared.reconnect_attempts.store(0, Ordering::Relaxed);

        let (ready_tx, ready_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(run_connection(shared, generation, ready_tx));
        if let Some(old) = self.shared.supervisor.lock().replace(handle) {
            old.abort();
        }

        ready_rx.await.map_err(|_| ClientError::Terminated)?
    }

    /// Close the connection and stop all reconnection. Idempotent; no events
    /// are emitted after this returns.
    pub fn disconnect(&self) {
        {
            let mut state = self.shared.state.write();
            self.shared.generation.fetch_add(1, Ordering::Relaxed);
            *state = ConnectionState::Terminated;
        }

        let close_sent = match self.shared.outbound.write().take() {
            Some(tx) => tx.send(Message::Close(None)).is_ok(),
            None => false,
        };
        if let Some(handle) = self.shared.supervisor.lock().take() {
            // With a close frame queued the socket task flushes it and exits
            // on its own; otherwise it may be dialing or sleeping and is
            // aborted outright.
            if !close_sent {
                handle.abort();
            }
        }
        tracing::debug!(endpoint = %self.shared.endpoint.path(), "client disconnected");
    }

    /// Serialize a message to JSON and transmit it. Returns `false` without
    /// transmitting when not connected or serialization fails; never errors.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize outbound message");
                return false;
            }
        };
        self.send_text(text)
    }

    /// Transmit raw text as-is. Returns `false` when not connected.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        if !self.is_connected() {
            tracing::debug!("send skipped: not connected");
            return false;
        }
        match self.shared.outbound.read().as_ref() {
            Some(tx) => tx.send(Message::Text(text.into().into())).is_ok(),
            None => false,
        }
    }

    /// Add event types to the held subscription set. When connected, sends a
    /// subscribe frame carrying just the types passed here; the full set is
    /// replayed automatically on every (re)connect.
    pub fn subscribe<I, S>(&self, event_types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requested = normalize(event_types);
        if requested.is_empty() {
            return;
        }
        {
            let mut subscriptions = self.shared.subscriptions.write();
            for event_type in &requested {
                subscriptions.insert(event_type.clone());
            }
        }
        if self.is_connected() {
            let frame = ControlFrame::Subscribe {
                event_types: requested,
            };
            if !self.send_text(frame.to_json()) {
                tracing::warn!("failed to send subscribe frame");
            }
        }
    }

    /// Remove event types from the held subscription set, notifying the
    /// server when connected.
    pub fn unsubscribe<I, S>(&self, event_types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requested = normalize(event_types);
        if requested.is_empty() {
            return;
        }
        {
            let mut subscriptions = self.shared.subscriptions.write();
            for event_type in &requested {
                subscriptions.remove(event_type);
            }
        }
        if self.is_connected() {
            let frame = ControlFrame::Unsubscribe {
                event_types: requested,
            };
            if !self.send_text(frame.to_json()) {
                tracing::warn!("failed to send unsubscribe frame");
            }
        }
    }

    /// Register a listener. Reserved types: `connect`, `disconnect`, `error`,
    /// `message`; anything else matches frames by their literal `type` value.
    pub fn on(&self, event_type: &str, handler: impl Fn(&Value) + Send + Sync + 'static) -> HandlerId {
        self.shared.listeners.on(event_type, handler)
    }

    /// Remove one listener, or all listeners for the type when `handler` is
    /// `None`.
    pub fn off(&self, event_type: &str, handler: Option<HandlerId>) {
        self.shared.listeners.off(event_type, handler);
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Identity presented on the next (re)connect: caller-supplied, or
    /// captured from the server's handshake frame.
    pub fn client_id(&self) -> Option<ClientId> {
        self.shared.client_id.read().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.shared.subscriptions.read().iter().cloned().collect()
    }

    /// Consecutive reconnect attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }
}

fn merge_subscriptions(config: &mut ClientConfig, extra: &[EventType]) {
    for event_type in extra {
        let name = event_type.as_str();
        if !config.subscriptions.iter().any(|s| s == name) {
            config.subscriptions.push(name.to_owned());
        }
    }
}

fn normalize<I, S>(event_types: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for event_type in event_types {
        let event_type = event_type.into();
        if event_type.is_empty() || !seen.insert(event_type.clone()) {
            continue;
        }
        out.push(event_type);
    }
    out
}

/// Write a state transition only if the task's generation is still current.
/// The generation is checked under the state lock, the same critical section
/// `connect()` and `disconnect()` use, so a superseded task can never
/// overwrite a terminal state. Returns false when superseded.
fn try_transition(shared: &Shared, generation: u64, next: ConnectionState) -> bool {
    let mut state = shared.state.write();
    if shared.generation.load(Ordering::Relaxed) != generation {
        return false;
    }
    *state = next;
    true
}

/// Connection supervisor: dials, drives the socket, and retries unclean
/// closes a bounded number of times with a constant delay. Owns the whole
/// lifecycle for one generation; a generation mismatch means this task was
/// superseded and must stop without touching anything.
async fn run_connection(
    shared: Arc<Shared>,
    generation: u64,
    ready: oneshot::Sender<Result<(), ClientError>>,
) {
    let mut ready = Some(ready);

    loop {
        if shared.generation.load(Ordering::Relaxed) != generation {
            return;
        }

        match open_socket(&shared).await {
            Ok(socket) => {
                if !try_transition(&shared, generation, ConnectionState::Connected) {
                    return;
                }
                shared.reconnect_attempts.store(0, Ordering::Relaxed);
                tracing::info!(endpoint = %shared.endpoint.path(), "connection established");
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }

                let outcome = drive_socket(&shared, generation, socket).await;

                if shared.generation.load(Ordering::Relaxed) != generation {
                    return;
                }
                shared.outbound.write().take();
                shared.listeners.emit(
                    reserved::DISCONNECT,
                    &json!({ "code": outcome.code, "reason": outcome.reason }),
                );

                if outcome.clean {
                    try_transition(&shared, generation, ConnectionState::Disconnected);
                    tracing::info!(code = outcome.code, "connection closed cleanly");
                    return;
                }
                tracing::warn!(
                    code = outcome.code,
                    reason = %outcome.reason,
                    "connection closed uncleanly"
                );
            }
            Err(e) => {
                if shared.generation.load(Ordering::Relaxed) != generation {
                    return;
                }
                tracing::warn!(error = %e, kind = e.error_kind(), "connection attempt failed");
                shared
                    .listeners
                    .emit(reserved::ERROR, &json!({ "error": e.to_string() }));
                // A failed open still closes the attempt, so listeners see
                // the same error-then-disconnect pair a dropped socket gives.
                shared.listeners.emit(
                    reserved::DISCONNECT,
                    &json!({ "code": 1006, "reason": e.to_string() }),
                );
                if !e.is_retryable() {
                    if !try_transition(&shared, generation, ConnectionState::Terminated) {
                        return;
                    }
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(Err(e));
                    }
                    return;
                }
            }
        }

        let attempts = shared.reconnect_attempts.load(Ordering::Relaxed);
        if attempts >= shared.config.max_reconnect_attempts {
            if !try_transition(&shared, generation, ConnectionState::Terminated) {
                return;
            }
            tracing::warn!(attempts, "reconnect attempts exhausted");
            if let Some(tx) = ready.take() {
                let _ = tx.send(Err(ClientError::ReconnectExhausted { attempts }));
            }
            return;
        }
        shared
            .reconnect_attempts
            .store(attempts + 1, Ordering::Relaxed);
        if !try_transition(&shared, generation, ConnectionState::Reconnecting) {
            return;
        }
        tracing::info!(
            attempt = attempts + 1,
            max = shared.config.max_reconnect_attempts,
            delay_ms = shared.config.reconnect_delay.as_millis() as u64,
            "scheduling reconnect"
        );
        tokio::time::sleep(shared.config.reconnect_delay).await;

        if !try_transition(&shared, generation, ConnectionState::Connecting) {
            return;
        }
    }
}

async fn open_socket(shared: &Shared) -> Result<WsStream, ClientError> {
    let url = {
        let client_id = shared.client_id.read().clone();
        shared.endpoint.url(
            &shared.base_url,
            client_id.as_ref(),
            shared.config.token.as_ref(),
        )
    };
    match connect_async(url.as_str()).await {
        Ok((socket, _)) => Ok(socket),
        Err(e) => Err(ClientError::Handshake(e.to_string())),
    }
}

/// Drive one open socket: keep-alive pings, outbound writes, inbound
/// dispatch. Returns how the session ended.
async fn drive_socket(shared: &Arc<Shared>, generation: u64, socket: WsStream) -> CloseOutcome {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    *shared.outbound.write() = Some(out_tx);

    // Replay the full subscription set on every successful open.
    let snapshot: Vec<String> = shared.subscriptions.read().iter().cloned().collect();
    if !snapshot.is_empty() {
        let frame = ControlFrame::Subscribe {
            event_types: snapshot,
        };
        if ws_tx
            .send(Message::Text(frame.to_json().into()))
            .await
            .is_err()
        {
            return CloseOutcome::unclean("subscription replay failed");
        }
    }

    let mut ping = tokio::time::interval(shared.config.ping_interval);
    ping.tick().await; // consume first immediate tick

    loop {
        tokio::select! {
            _ = ping.tick() => {
                let frame = ControlFrame::ping_now();
                if ws_tx.send(Message::Text(frame.to_json().into())).await.is_err() {
                    return CloseOutcome::unclean("ping send failed");
                }
                tracing::trace!("sent keep-alive ping");
            }
            command = out_rx.recv() => {
                match command {
                    Some(message) => {
                        let closing = matches!(message, Message::Close(_));
                        if ws_tx.send(message).await.is_err() {
                            return CloseOutcome::unclean("send failed");
                        }
                        // disconnect() queues a close frame; make sure it
                        // reaches the wire before the task winds down.
                        if closing {
                            let _ = ws_tx.flush().await;
                            return CloseOutcome {
                                code: 1000,
                                reason: String::new(),
                                clean: true,
                            };
                        }
                    }
                    None => return CloseOutcome::unclean("outbound channel closed"),
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if shared.generation.load(Ordering::Relaxed) != generation {
                            return CloseOutcome::unclean("superseded");
                        }
                        handle_frame(shared, &text);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws_tx.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                            None => (1000, String::new()),
                        };
                        return CloseOutcome { code, reason, clean: true };
                    }
                    Some(Ok(_)) => {} // binary and pong frames are ignored
                    Some(Err(e)) => {
                        if shared.generation.load(Ordering::Relaxed) == generation {
                            shared
                                .listeners
                                .emit(reserved::ERROR, &json!({ "error": e.to_string() }));
                        }
                        return CloseOutcome::unclean(e.to_string());
                    }
                    None => return CloseOutcome::unclean("stream ended without close handshake"),
                }
            }
        }
    }
}

/// Classify and dispatch one inbound text frame. Malformed frames are logged
/// and dropped; system frames never reach the `message` fan-out.
fn handle_frame(shared: &Shared, text: &str) {
    let frame = match ServerFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed frame");
            return;
        }
    };

    match frame {
        ServerFrame::Pong => tracing::trace!("received pong"),
        ServerFrame::Error(raw) => shared.listeners.emit(reserved::ERROR, &raw),
        ServerFrame::ConnectionEstablished { client_id, raw } => {
            if let Some(id) = client_id {
                tracing::debug!(client_id = %id, "server assigned client id");
                *shared.client_id.write() = Some(id);
            }
            shared.listeners.emit(reserved::CONNECT, &raw);
        }
        ServerFrame::Event { event_type, raw } => {
            shared.listeners.emit(&event_type, &raw);
            shared.listeners.emit(reserved::MESSAGE, &raw);
        }
    }
}
