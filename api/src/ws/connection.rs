//! Authenticated gateway connections.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use refundly_sdk::ws::ServerMessage;
use refundly_sdk::{Audience, Identity, Role};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Global connection ID counter.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique connection ID.
#[must_use]
pub fn next_connection_id() -> u64 {
    CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Result of queueing a frame for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The frame was queued.
    Queued,
    /// The outbound queue was full; the frame was dropped.
    Full,
    /// The socket is gone; the frame was dropped.
    Closed,
}

/// A registered, authenticated socket.
///
/// Created only after the session token was validated; there is no
/// unauthenticated state.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Unique connection ID.
    pub id: u64,

    /// Who is on the other end.
    pub identity: Identity,

    /// When the connection was registered.
    pub connected_at: DateTime<Utc>,

    /// Bounded outbound queue drained by the socket writer.
    pub sender: mpsc::Sender<ServerMessage>,
}

impl Connection {
    /// Creates a new connection.
    #[must_use]
    pub fn new(identity: Identity, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: next_connection_id(),
            identity,
            connected_at: Utc::now(),
            sender,
        }
    }

    /// Returns the connection ID.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the user ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    /// Returns the role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.identity.role
    }

    /// Returns true if this connection belongs to `audience`.
    #[must_use]
    pub fn accepts(&self, audience: &Audience) -> bool {
        audience.includes(self.user_id(), self.role().is_staff())
    }

    /// Returns how long the connection has been open.
    #[must_use]
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.connected_at
    }

    /// Queues a frame without waiting.
    pub fn try_send(&self, message: ServerMessage) -> Delivery {
        match self.sender.try_send(message) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}
