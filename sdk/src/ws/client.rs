//! Socket manager implementation.
//!
//! Owns at most one gateway connection per client session. A single driver
//! task holds the socket, the heartbeat timer and the reconnection timer, so
//! stopping the driver cancels all three at once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::config::WsConfig;
use super::error::WsError;
use super::messages::{ClientMessage, ServerMessage, CLOSE_UNAUTHORIZED};
use super::state::{Backoff, ConnectionState};
use crate::events::DomainEvent;
use crate::types::Identity;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// What subscribers receive from the socket manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A domain event pushed by the gateway.
    Event(DomainEvent),
    /// Events may have been missed (reconnect or slow subscriber); treat every
    /// cached query as stale.
    Resync,
}

#[derive(Debug, Clone)]
struct Envelope {
    epoch: u64,
    signal: Signal,
}

#[derive(Debug)]
struct Shared {
    state: watch::Sender<ConnectionState>,
    signals: broadcast::Sender<Envelope>,
    /// Advanced by every `connect()` and `disconnect()`.
    epoch: AtomicU64,
    /// Set once any session has been acknowledged.
    ever_connected: AtomicBool,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state changed");
        }
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn advance_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn publish(&self, epoch: u64, signal: Signal) {
        // No subscribers is fine.
        let _ = self.signals.send(Envelope { epoch, signal });
    }

    /// Marks a session as acknowledged and asks subscribers to resync if an
    /// earlier session existed.
    fn session_established(&self, epoch: u64) {
        if self.ever_connected.swap(true, Ordering::AcqRel) {
            self.publish(epoch, Signal::Resync);
        }
    }
}

/// Subscription to the socket manager's signal stream.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<Envelope>,
    shared: Arc<Shared>,
}

impl EventSubscription {
    /// Waits for the next signal from the current session.
    ///
    /// Signals that arrived under an earlier session (before the latest
    /// `connect()` or `disconnect()`) are discarded. Returns `None` once the
    /// manager is gone.
    pub async fn recv(&mut self) -> Option<Signal> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.epoch == self.shared.current_epoch() => {
                    return Some(envelope.signal);
                }
                Ok(envelope) => {
                    debug!(epoch = envelope.epoch, "discarding signal from a previous session");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged behind the socket");
                    return Some(Signal::Resync);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[derive(Debug)]
struct Driver {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Driver {
    fn spawn(
        shared: Arc<Shared>,
        config: WsConfig,
        token: String,
        epoch: u64,
        ready: oneshot::Sender<Result<(), WsError>>,
    ) -> Self {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(drive(shared, config, token, epoch, ready, shutdown_rx));
        Self { shutdown, handle }
    }

    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.handle.await {
            if !err.is_cancelled() {
                warn!(error = %err, "socket driver task failed");
            }
        }
    }
}

/// Client-side owner of the gateway connection.
///
/// Create one per client session and share it; every view subscribes
/// through the same manager.
#[derive(Debug)]
pub struct SocketManager {
    config: WsConfig,
    shared: Arc<Shared>,
    driver: Mutex<Option<Driver>>,
}

impl SocketManager {
    /// Creates a new socket manager with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WsConfig) -> Result<Self, WsError> {
        config.validate()?;

        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (signals, _) = broadcast::channel(config.event_buffer);

        Ok(Self {
            config,
            shared: Arc::new(Shared {
                state,
                signals,
                epoch: AtomicU64::new(0),
                ever_connected: AtomicBool::new(false),
            }),
            driver: Mutex::new(None),
        })
    }

    /// Creates a new socket manager for the given gateway URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_url(url: impl Into<String>) -> Result<Self, WsError> {
        Self::new(WsConfig::new(url))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Returns true if connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Returns a receiver that observes connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Subscribes to the signal stream.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.shared.signals.subscribe(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.shared.signals.receiver_count()
    }

    /// Connects to the gateway with the given session token.
    ///
    /// A no-op when already connected. Otherwise any stale socket, pending
    /// retry or in-flight attempt is torn down before a new socket is opened.
    /// The attempt runs on the driver task, so a concurrent `disconnect()` or
    /// `connect()` cancels it instead of waiting for it.
    ///
    /// Subscribers receive [`Signal::Resync`] when this succeeds after an
    /// earlier session.
    ///
    /// # Errors
    ///
    /// - [`WsError::Unauthorized`] if the gateway rejected the token. The
    ///   manager moves to [`ConnectionState::Reauthenticating`] and does not
    ///   retry.
    /// - [`WsError::Superseded`] if the attempt was cancelled by
    ///   `disconnect()` or another `connect()`.
    /// - A retryable error if the first attempt failed at the transport
    ///   level or timed out; bounded reconnection continues in the background.
    pub async fn connect(&self, token: &str) -> Result<(), WsError> {
        let ready = {
            let mut driver = self.driver.lock().await;

            if let Some(active) = driver.as_ref() {
                if active.is_running() && self.is_connected() {
                    debug!("already connected, ignoring connect");
                    return Ok(());
                }
            }

            if let Some(stale) = driver.take() {
                debug!("tearing down stale socket");
                stale.stop().await;
            }

            let epoch = self.shared.advance_epoch();
            self.shared.set_state(ConnectionState::Connecting { attempt: 0 });

            let (ready, ready_rx) = oneshot::channel();
            *driver = Some(Driver::spawn(
                Arc::clone(&self.shared),
                self.config.clone(),
                token.to_string(),
                epoch,
                ready,
            ));
            ready_rx
        };

        ready.await.unwrap_or_else(|_| {
            debug!("connection attempt superseded");
            Err(WsError::Superseded)
        })
    }

    /// Closes the connection and cancels any pending retry.
    ///
    /// Signals already queued for subscribers are discarded.
    pub async fn disconnect(&self) {
        let mut driver = self.driver.lock().await;
        self.shared.advance_epoch();

        if let Some(active) = driver.take() {
            active.stop().await;
            info!("disconnected from gateway");
        }

        self.shared.set_state(ConnectionState::Disconnected);
    }
}

enum SessionEnd {
    Shutdown,
    Unauthorized,
    Dropped,
}

async fn drive(
    shared: Arc<Shared>,
    config: WsConfig,
    token: String,
    epoch: u64,
    ready: oneshot::Sender<Result<(), WsError>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let backoff = Backoff::from_config(&config);
    let mut attempt: u32 = 0;

    let opened = tokio::select! {
        _ = &mut shutdown => return,
        opened = open(&config, &token) => opened,
    };

    let mut stream = match opened {
        Ok(connected) => {
            shared.set_state(ConnectionState::Connected);
            shared.session_established(epoch);
            info!(url = %config.url, "connected to gateway");
            let _ = ready.send(Ok(()));
            Some(connected)
        }
        Err(WsError::Unauthorized) => {
            warn!("gateway rejected session token");
            shared.set_state(ConnectionState::Reauthenticating);
            let _ = ready.send(Err(WsError::Unauthorized));
            return;
        }
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "initial connection failed, retrying in background");
            let _ = ready.send(Err(err));
            None
        }
        Err(err) => {
            shared.set_state(ConnectionState::Disconnected);
            let _ = ready.send(Err(err));
            return;
        }
    };

    loop {
        if let Some(connected) = stream.take() {
            if attempt > 0 {
                info!(attempt, "reconnected to gateway");
                shared.set_state(ConnectionState::Connected);
                shared.ever_connected.store(true, Ordering::Release);
                shared.publish(epoch, Signal::Resync);
            }
            attempt = 0;

            match run_session(&shared, &config, epoch, connected, &mut shutdown).await {
                SessionEnd::Shutdown => return,
                SessionEnd::Unauthorized => {
                    warn!("gateway ended the session, re-authentication required");
                    shared.set_state(ConnectionState::Reauthenticating);
                    return;
                }
                SessionEnd::Dropped => warn!("connection to gateway dropped"),
            }
        }

        attempt = attempt.saturating_add(1);
        let Some(delay) = backoff.delay(attempt) else {
            warn!(
                attempts = backoff.max_attempts(),
                "giving up on gateway after bounded retries"
            );
            shared.set_state(ConnectionState::Disconnected);
            return;
        };

        shared.set_state(ConnectionState::Connecting { attempt });
        debug!(attempt, ?delay, "scheduling reconnection");

        tokio::select! {
            _ = &mut shutdown => return,
            _ = time::sleep(delay) => {}
        }

        let opened = tokio::select! {
            _ = &mut shutdown => return,
            opened = open(&config, &token) => opened,
        };

        match opened {
            Ok(connected) => stream = Some(connected),
            Err(WsError::Unauthorized) => {
                warn!("gateway rejected session token on reconnect");
                shared.set_state(ConnectionState::Reauthenticating);
                return;
            }
            Err(err) => warn!(attempt, error = %err, "reconnection attempt failed"),
        }
    }
}

async fn run_session(
    shared: &Shared,
    config: &WsConfig,
    epoch: u64,
    stream: WsStream,
    shutdown: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    let (mut sink, mut source) = stream.split();
    let mut heartbeat = time::interval_at(
        Instant::now() + config.heartbeat_interval,
        config.heartbeat_interval,
    );

    loop {
        tokio::select! {
            _ = &mut *shutdown => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            _ = heartbeat.tick() => {
                if let Err(err) = send_message(&mut sink, &ClientMessage::Ping).await {
                    warn!(error = %err, "heartbeat failed");
                    return SessionEnd::Dropped;
                }
            }
            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(ServerMessage::Event(event)) => {
                            debug!(event = %event.kind(), "event received");
                            shared.publish(epoch, Signal::Event(event));
                        }
                        Ok(msg) if msg.is_unauthorized() => return SessionEnd::Unauthorized,
                        Ok(ServerMessage::Error { code, message }) => {
                            warn!(%code, %message, "gateway reported an error");
                        }
                        Ok(ServerMessage::Pong) => debug!("pong"),
                        Ok(ServerMessage::Connected { .. }) => {
                            debug!("ignoring repeated connected acknowledgement");
                        }
                        Err(err) => warn!(error = %err, "discarding malformed frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        return if is_unauthorized_close(frame.as_ref()) {
                            SessionEnd::Unauthorized
                        } else {
                            SessionEnd::Dropped
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "socket error");
                        return SessionEnd::Dropped;
                    }
                    None => return SessionEnd::Dropped,
                }
            }
        }
    }
}

/// Opens a socket and waits for the gateway's acknowledgement.
///
/// The upgrade and the acknowledgement share one `handshake_timeout`.
async fn open(config: &WsConfig, token: &str) -> Result<WsStream, WsError> {
    let mut request = config.url.as_str().into_client_request()?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
        WsError::InvalidConfig("session token is not a valid header value".to_string())
    })?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    match time::timeout(config.handshake_timeout, handshake(request)).await {
        Ok(result) => result,
        Err(_) => Err(WsError::Connection(format!(
            "gateway handshake timed out after {:?}",
            config.handshake_timeout
        ))),
    }
}

async fn handshake(request: Request) -> Result<WsStream, WsError> {
    let (mut stream, _) = match tokio_tungstenite::connect_async(request).await {
        Ok(connected) => connected,
        Err(tungstenite::Error::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
            return Err(WsError::Unauthorized);
        }
        Err(err) => return Err(WsError::Connection(err.to_string())),
    };

    let identity = await_ack(&mut stream).await?;
    debug!(user_id = %identity.user_id, role = %identity.role, "gateway acknowledged session");
    Ok(stream)
}

async fn await_ack(stream: &mut WsStream) -> Result<Identity, WsError> {
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => {
                let msg: ServerMessage = serde_json::from_str(&text)
                    .map_err(|e| WsError::Deserialization(e.to_string()))?;
                match msg {
                    ServerMessage::Connected { user_id, role } => {
                        return Ok(Identity { user_id, role });
                    }
                    msg if msg.is_unauthorized() => return Err(WsError::Unauthorized),
                    other => debug!(?other, "ignoring frame before acknowledgement"),
                }
            }
            Message::Close(frame) => {
                return Err(if is_unauthorized_close(frame.as_ref()) {
                    WsError::Unauthorized
                } else {
                    WsError::Closed
                });
            }
            _ => {}
        }
    }
    Err(WsError::Closed)
}

async fn send_message(sink: &mut WsSink, msg: &ClientMessage) -> Result<(), WsError> {
    let json = serde_json::to_string(msg).map_err(|e| WsError::Serialization(e.to_string()))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| WsError::SendFailed(e.to_string()))
}

fn is_unauthorized_close(frame: Option<&CloseFrame>) -> bool {
    frame.is_some_and(|frame| u16::from(frame.code) == CLOSE_UNAUTHORIZED)
}
