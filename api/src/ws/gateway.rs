//! Realtime gateway core.
//!
//! Authenticates sockets, tracks them in a [`ConnectionRegistry`] and relays
//! domain events to their audience. Mutation handlers call
//! [`Gateway::emit`] after a committed write.

use std::sync::Arc;

use refundly_sdk::ws::ServerMessage;
use refundly_sdk::{DomainEvent, Identity};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::Connection;
use super::metrics::WsMetrics;
use super::registry::{ConnectionRegistry, FanoutReport, InProcessRegistry};
use crate::auth::SessionValidator;
use crate::config::DEFAULT_OUTBOUND_BUFFER;
use crate::error::GatewayError;

/// A registered connection as seen by the socket that owns it.
#[derive(Debug)]
pub struct GatewaySession {
    /// Connection ID.
    pub id: u64,
    /// Authenticated identity.
    pub identity: Identity,
    /// Handle for direct replies to this socket (pongs, errors).
    pub replies: Connection,
    /// Frames waiting to be written to the socket.
    pub outbound: mpsc::Receiver<ServerMessage>,
}

/// The realtime gateway.
#[derive(Clone)]
pub struct Gateway {
    validator: Arc<dyn SessionValidator>,
    registry: Arc<dyn ConnectionRegistry>,
    metrics: Arc<WsMetrics>,
    outbound_buffer: usize,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("outbound_buffer", &self.outbound_buffer)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Creates a gateway with an in-process registry.
    #[must_use]
    pub fn new(validator: Arc<dyn SessionValidator>) -> Self {
        Self::with_registry(validator, Arc::new(InProcessRegistry::new()))
    }

    /// Creates a gateway over the given registry.
    #[must_use]
    pub fn with_registry(
        validator: Arc<dyn SessionValidator>,
        registry: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        Self {
            validator,
            registry,
            metrics: Arc::new(WsMetrics::new()),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }

    /// Sets the per-connection outbound queue size. Zero is raised to one.
    #[must_use]
    pub fn with_outbound_buffer(mut self, size: usize) -> Self {
        self.outbound_buffer = size.max(1);
        self
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> &Arc<WsMetrics> {
        &self.metrics
    }

    /// Resolves a session token to an identity.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::MissingToken`] for an absent or blank token.
    /// - [`GatewayError::InvalidToken`] if the identity provider rejected it.
    /// - [`GatewayError::AuthUnavailable`] if the identity provider failed.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, GatewayError> {
        let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) else {
            self.metrics.record_auth_failure();
            return Err(GatewayError::MissingToken);
        };

        match self.validator.validate(token).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => {
                self.metrics.record_auth_failure();
                Err(GatewayError::InvalidToken)
            }
            Err(err) => {
                warn!(error = %err, "session validation failed");
                self.metrics.record_auth_failure();
                Err(GatewayError::AuthUnavailable(err.to_string()))
            }
        }
    }

    /// Registers an authenticated identity and returns its session.
    pub async fn register(&self, identity: Identity) -> GatewaySession {
        let (sender, outbound) = mpsc::channel(self.outbound_buffer);
        let connection = Connection::new(identity.clone(), sender);
        let id = connection.id();
        let replies = connection.clone();

        self.registry.register(connection).await;
        self.metrics.record_connection_opened();
        info!(connection_id = id, user_id = %identity.user_id, role = %identity.role, "connection registered");

        GatewaySession {
            id,
            identity,
            replies,
            outbound,
        }
    }

    /// Authenticates `token` and registers the connection.
    ///
    /// # Errors
    ///
    /// Returns the authentication error; nothing is registered in that case.
    pub async fn connect(&self, token: &str) -> Result<GatewaySession, GatewayError> {
        let identity = self.authenticate(Some(token)).await?;
        Ok(self.register(identity).await)
    }

    /// Removes a connection. Returns false if it was not registered.
    pub async fn disconnect(&self, id: u64) -> bool {
        match self.registry.unregister(id).await {
            Some(connection) => {
                self.metrics.record_connection_closed();
                info!(
                    connection_id = id,
                    user_id = %connection.user_id(),
                    open_secs = connection.age().num_seconds(),
                    "connection unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Relays `event` to its audience. Never fails the caller.
    pub async fn emit(&self, event: DomainEvent) -> FanoutReport {
        let report = self.registry.emit(&event).await;
        self.metrics.record_fanout(&report);
        debug!(
            event = %event.kind(),
            targeted = report.targeted,
            delivered = report.delivered,
            dropped = report.dropped,
            "event emitted"
        );
        report
    }

    /// Returns the number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.connection_count().await
    }
}
