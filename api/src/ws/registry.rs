//! Connection registry and event fan-out.
//!
//! [`ConnectionRegistry`] is the seam between the gateway and wherever
//! connections live. [`InProcessRegistry`] keeps them in this process; a
//! shared pub/sub backend can implement the same trait to fan out across
//! gateway instances.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use refundly_sdk::ws::ServerMessage;
use refundly_sdk::DomainEvent;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::{Connection, Delivery};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    /// Connections in the event's audience.
    pub targeted: usize,
    /// Frames queued.
    pub delivered: usize,
    /// Frames dropped (full queue or closed socket).
    pub dropped: usize,
}

/// Where connections are tracked and events fanned out.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Adds a connection.
    async fn register(&self, connection: Connection);

    /// Removes a connection, returning it if it was registered.
    async fn unregister(&self, id: u64) -> Option<Connection>;

    /// Delivers `event` to every connection in its audience.
    ///
    /// Best-effort and at-most-once: never blocks on a slow socket and never
    /// fails.
    async fn emit(&self, event: &DomainEvent) -> FanoutReport;

    /// Returns the number of registered connections.
    async fn connection_count(&self) -> usize;
}

/// Single-process registry.
#[derive(Debug, Default)]
pub struct InProcessRegistry {
    /// Map from connection ID to connection.
    connections: Arc<RwLock<HashMap<u64, Connection>>>,
}

impl InProcessRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ConnectionRegistry for InProcessRegistry {
    async fn register(&self, connection: Connection) {
        let mut connections = self.connections.write().await;
        connections.insert(connection.id(), connection);
    }

    async fn unregister(&self, id: u64) -> Option<Connection> {
        let mut connections = self.connections.write().await;
        connections.remove(&id)
    }

    async fn emit(&self, event: &DomainEvent) -> FanoutReport {
        let audience = event.audience();

        // Deliver outside the lock so a disconnect mid-fan-out cannot block
        // or invalidate the iteration.
        let targets: Vec<Connection> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|conn| conn.accepts(&audience))
                .cloned()
                .collect()
        };

        let mut report = FanoutReport {
            targeted: targets.len(),
            ..FanoutReport::default()
        };
        let message = ServerMessage::event(event.clone());

        for conn in targets {
            let id = conn.id();
            match conn.try_send(message.clone()) {
                Delivery::Queued => report.delivered += 1,
                Delivery::Full => {
                    warn!(connection_id = id, event = %event.kind(), "outbound queue full, dropping event");
                    report.dropped += 1;
                }
                Delivery::Closed => {
                    debug!(connection_id = id, event = %event.kind(), "socket closed, dropping event");
                    report.dropped += 1;
                }
            }
        }

        report
    }

    async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
