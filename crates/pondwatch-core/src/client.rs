// ── Alert client ──
//
// Connection lifecycle for the realtime alert hub: owns the one physical
// connection, drives the Disconnected → Connecting → Connected →
// Reconnecting state machine, decodes inbound frames and fans them out
// through the SubscriberRegistry.
//
// All state lives behind one mutex and every transition is made while
// holding it. The background session task re-checks its generation
// under that lock before each transition, so a `stop()` or a newer
// `start()` silently retires it: no stale transition, retry or alert can
// slip out of an old session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde::Serialize;
use strum::Display;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use pondwatch_api::{
    AlertEvent, AlertResolution, Connection, Inbound, InboundMessage, Transport, WsTransport,
    decode_frame, endpoint, redacted,
};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::registry::{Notification, SubscriberRegistry, Subscription};

/// How long a graceful close may take before the socket is just dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

// ── Internal bookkeeping ─────────────────────────────────────────────

#[derive(Debug, Default)]
struct ReconnectState {
    /// Failed attempts since the last successful open.
    attempts: u32,
    /// Cleared by `stop()`; nothing reconnects while it is false.
    enabled: bool,
}

struct ActiveSession {
    generation: u64,
    cancel: CancellationToken,
    /// Present only while the session is Connected.
    outbound: Option<mpsc::UnboundedSender<String>>,
}

struct Lifecycle {
    state: ConnectionState,
    reconnect: ReconnectState,
    token: Option<SecretString>,
    session: Option<ActiveSession>,
    next_generation: u64,
}

impl Lifecycle {
    fn is_current(&self, generation: u64) -> bool {
        self.reconnect.enabled
            && self
                .session
                .as_ref()
                .is_some_and(|s| s.generation == generation)
    }
}

// ── AlertClient ──────────────────────────────────────────────────────

/// Realtime alert client.
///
/// Cheaply cloneable via `Arc<ClientInner>`. Create one at application
/// start, hand clones to whoever needs to subscribe, and call
/// [`stop()`](Self::stop) once at teardown: the background connection
/// task holds its own reference and keeps retrying until stopped.
#[derive(Clone)]
pub struct AlertClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    registry: SubscriberRegistry,
    state_tx: watch::Sender<ConnectionState>,
    runtime: Handle,
    lifecycle: Mutex<Lifecycle>,
}

impl AlertClient {
    /// Create a client over an arbitrary [`Transport`]. Does NOT connect --
    /// call [`start()`](Self::start).
    ///
    /// The connection task is spawned onto the Tokio runtime this is
    /// called from.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoRuntime`] when called outside a Tokio runtime. Use
    /// [`with_runtime`](Self::with_runtime) to pass a handle explicitly.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self, ClientError> {
        let runtime = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        Ok(Self::with_runtime(config, transport, runtime))
    }

    /// Create a client whose connection task runs on `runtime`.
    pub fn with_runtime(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                registry: SubscriberRegistry::new(),
                state_tx,
                runtime,
                lifecycle: Mutex::new(Lifecycle {
                    state: ConnectionState::Disconnected,
                    reconnect: ReconnectState::default(),
                    token: None,
                    session: None,
                    next_generation: 1,
                }),
            }),
        }
    }

    /// Create a client that speaks WebSocket to `config.endpoint`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn websocket(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(WsTransport::new(config.connect_timeout));
        Self::new(config, transport)
    }

    /// Access the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the connection, authenticating with `token` if given.
    ///
    /// No-op while Connecting or Connected. From Reconnecting, the
    /// pending retry is cancelled and a fresh attempt starts right away.
    /// Resets the attempt counter. Failures are reported through state
    /// changes, never returned.
    pub fn start(&self, token: Option<SecretString>) {
        let mut lc = self.inner.lifecycle();
        if matches!(
            lc.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(state = %lc.state, "start() ignored, connection already active");
            return;
        }

        lc.token = token;
        lc.reconnect = ReconnectState {
            attempts: 0,
            enabled: true,
        };
        self.launch(&mut lc);
        drop(lc);
        self.inner.registry.flush();
    }

    /// Explicit retry after the client gave up (or to skip a pending
    /// backoff delay). Reuses the token from the last `start()`.
    pub fn retry(&self) -> Result<(), ClientError> {
        let mut lc = self.inner.lifecycle();
        if matches!(
            lc.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(state = %lc.state, "retry() ignored, connection already active");
            return Ok(());
        }
        if !lc.reconnect.enabled {
            warn!("retry() after stop(), ignoring");
            return Err(ClientError::Stopped);
        }

        lc.reconnect.attempts = 0;
        self.launch(&mut lc);
        drop(lc);
        self.inner.registry.flush();
        Ok(())
    }

    /// Shut the connection down and disable reconnection.
    ///
    /// Cancels any scheduled retry, closes the live socket, forgets the
    /// token and attempt counter, drops every alert subscription and
    /// emits a final `Disconnected`. State subscriptions are kept. Safe
    /// to call repeatedly.
    pub fn stop(&self) {
        let mut lc = self.inner.lifecycle();
        if !lc.reconnect.enabled && lc.session.is_none() {
            return;
        }

        if let Some(session) = lc.session.take() {
            session.cancel.cancel();
        }
        lc.reconnect = ReconnectState::default();
        lc.token = None;
        self.inner.set_state(&mut lc, ConnectionState::Disconnected);
        self.inner.registry.clear_alert_handlers();
        drop(lc);

        info!("Alert client stopped");
        self.inner.registry.flush();
    }

    /// Replace the token used by later connection attempts. The live
    /// connection, if any, is left alone.
    pub fn update_token(&self, token: Option<SecretString>) {
        let mut lc = self.inner.lifecycle();
        if lc.reconnect.enabled {
            lc.token = token;
        } else {
            debug!("update_token() on a stopped client, ignoring");
        }
    }

    /// Serialize `payload` as JSON and send it over the live connection.
    ///
    /// Only works while Connected; otherwise the payload is dropped and
    /// [`ClientError::NotConnected`] is returned. There is no queueing.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), ClientError> {
        let text = serde_json::to_string(payload)?;

        let lc = self.inner.lifecycle();
        let state = lc.state;
        let sent = lc
            .session
            .as_ref()
            .and_then(|s| s.outbound.as_ref())
            .filter(|_| state == ConnectionState::Connected)
            .is_some_and(|tx| tx.send(text).is_ok());

        if sent {
            Ok(())
        } else {
            warn!(%state, "send() while not connected, payload dropped");
            Err(ClientError::NotConnected { state })
        }
    }

    /// Current connection state. No side effects.
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle().state
    }

    /// Failed attempts since the last successful connection.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lifecycle().reconnect.attempts
    }

    /// Watch channel mirroring every state transition.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// `Stream` of states, starting with the current one.
    pub fn state_stream(&self) -> WatchStream<ConnectionState> {
        WatchStream::new(self.state_watch())
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Register a handler for incoming alerts.
    pub fn on_alert(&self, handler: impl Fn(&AlertEvent) + Send + Sync + 'static) -> Subscription {
        self.inner.registry.on_alert(handler)
    }

    /// Register a handler for alert resolutions.
    pub fn on_alert_resolved(
        &self,
        handler: impl Fn(&AlertResolution) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.registry.on_alert_resolved(handler)
    }

    /// Register a handler for connection state transitions.
    pub fn on_state_change(
        &self,
        handler: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.registry.on_state_change(handler)
    }

    pub(crate) fn registry(&self) -> &SubscriberRegistry {
        &self.inner.registry
    }

    // ── Internals ────────────────────────────────────────────────

    /// Retire any current session and spawn a new one in Connecting.
    fn launch(&self, lc: &mut Lifecycle) {
        if let Some(old) = lc.session.take() {
            old.cancel.cancel();
        }

        let generation = lc.next_generation;
        lc.next_generation += 1;

        let cancel = CancellationToken::new();
        lc.session = Some(ActiveSession {
            generation,
            cancel: cancel.clone(),
            outbound: None,
        });
        self.inner.set_state(lc, ConnectionState::Connecting);

        let inner = Arc::clone(&self.inner);
        self.inner
            .runtime
            .spawn(run_session(inner, generation, cancel));
    }
}

impl std::fmt::Debug for AlertClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertClient")
            .field("endpoint", &self.inner.config.endpoint.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ── Transitions (always under the lifecycle lock) ────────────────────

impl ClientInner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a transition and queue its notification. The caller flushes
    /// the registry once the lock is released.
    fn set_state(&self, lc: &mut Lifecycle, next: ConnectionState) {
        if lc.state == next {
            return;
        }
        debug!(from = %lc.state, to = %next, "Connection state change");
        lc.state = next;
        self.state_tx.send_replace(next);
        self.registry.enqueue(Notification::State(next));
    }

    /// Endpoint for the next attempt, or `None` if this session is stale.
    fn attempt_url(&self, generation: u64) -> Option<Url> {
        let lc = self.lifecycle();
        lc.is_current(generation)
            .then(|| endpoint(&self.config.endpoint, lc.token.as_ref()))
    }

    fn on_open(&self, generation: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        let mut lc = self.lifecycle();
        if !lc.is_current(generation) {
            return false;
        }
        lc.reconnect.attempts = 0;
        if let Some(session) = lc.session.as_mut() {
            session.outbound = Some(outbound);
        }
        self.set_state(&mut lc, ConnectionState::Connected);
        drop(lc);

        info!("Connected to alert hub");
        self.registry.flush();
        true
    }

    /// Count a failure and decide what happens next: `Some(delay)` to
    /// retry after `delay`, `None` to end the session.
    fn on_failure(&self, generation: u64) -> Option<Duration> {
        let mut lc = self.lifecycle();
        if !lc.is_current(generation) {
            return None;
        }
        if let Some(session) = lc.session.as_mut() {
            session.outbound = None;
        }

        lc.reconnect.attempts = lc.reconnect.attempts.saturating_add(1);
        let attempt = lc.reconnect.attempts;
        let policy = self.config.backoff;

        let next = if policy.allows(attempt) {
            self.set_state(&mut lc, ConnectionState::Reconnecting);
            let delay = policy.delay(attempt);
            info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt,
                "Waiting before reconnect"
            );
            Some(delay)
        } else {
            error!(
                max_attempts = policy.max_attempts,
                "Alert hub reconnection limit reached, giving up"
            );
            lc.session = None;
            self.set_state(&mut lc, ConnectionState::Disconnected);
            None
        };
        drop(lc);

        self.registry.flush();
        next
    }

    fn on_retry(&self, generation: u64) -> bool {
        let mut lc = self.lifecycle();
        if !lc.is_current(generation) {
            return false;
        }
        self.set_state(&mut lc, ConnectionState::Connecting);
        drop(lc);

        self.registry.flush();
        true
    }

    /// Decode one text frame and fan it out.
    fn dispatch_frame(&self, generation: u64, text: &str) {
        let notification = match decode_frame(text) {
            Ok(InboundMessage::AlertReceived(alert)) => {
                debug!(alert = %alert.id, severity = %alert.severity, "Alert received");
                Notification::Alert(alert)
            }
            Ok(InboundMessage::AlertResolved(resolution)) => {
                debug!(alert = %resolution.alert_id, "Alert resolved");
                Notification::Resolved(resolution)
            }
            Ok(InboundMessage::Unrecognized(raw)) => {
                debug!(frame = %raw, "Ignoring unrecognized frame");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Dropping undecodable frame");
                return;
            }
        };

        let lc = self.lifecycle();
        if !lc.is_current(generation) {
            return;
        }
        self.registry.enqueue(notification);
        drop(lc);

        self.registry.flush();
    }
}

// ── Background session task ──────────────────────────────────────────

/// Why a live connection stopped being useful.
enum SessionEnd {
    /// `stop()` or a newer session took over.
    Cancelled,
    /// The peer or the network dropped us.
    Lost(String),
}

/// Main loop: connect → read → on failure, backoff → reconnect.
async fn run_session(inner: Arc<ClientInner>, generation: u64, cancel: CancellationToken) {
    loop {
        let Some(url) = inner.attempt_url(generation) else {
            break;
        };
        info!(url = %redacted(&url), "Connecting to alert hub");

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = inner.transport.open(url) => result,
        };

        let reason = match opened {
            Ok(conn) => {
                let (tx, rx) = mpsc::unbounded_channel();
                if !inner.on_open(generation, tx) {
                    break;
                }
                match pump(&inner, generation, conn, rx, &cancel).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Lost(reason) => reason,
                }
            }
            Err(e) => {
                if e.is_auth_rejected() {
                    warn!("Alert hub rejected the access token");
                }
                e.to_string()
            }
        };
        warn!(error = %reason, "Alert hub connection lost");

        let Some(delay) = inner.on_failure(generation) else {
            break;
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        if !inner.on_retry(generation) {
            break;
        }
    }

    debug!(generation, "Alert session task exiting");
}

/// Read frames and write queued payloads until the connection drops or
/// the session is cancelled.
async fn pump(
    inner: &ClientInner,
    generation: u64,
    conn: Connection,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let Connection {
        mut outbound,
        mut inbound,
    } = conn;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = tokio::time::timeout(CLOSE_TIMEOUT, outbound.close()).await;
                return SessionEnd::Cancelled;
            }
            Some(text) = outbound_rx.recv() => {
                if let Err(e) = outbound.send(text).await {
                    return SessionEnd::Lost(e.to_string());
                }
            }
            item = inbound.next() => match item {
                Some(Ok(Inbound::Text(text))) => inner.dispatch_frame(generation, &text),
                Some(Ok(Inbound::Close(Some(info)))) => {
                    return SessionEnd::Lost(format!(
                        "closed by server (code {}): {}",
                        info.code, info.reason
                    ));
                }
                Some(Ok(Inbound::Close(None))) => {
                    return SessionEnd::Lost("closed by server".into());
                }
                Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                None => return SessionEnd::Lost("stream ended".into()),
            },
        }
    }
}
