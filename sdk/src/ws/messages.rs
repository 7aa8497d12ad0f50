//! WebSocket message types.
//!
//! Defines the frames exchanged between the gateway and its clients. Both
//! sides use these types, so the event names cannot drift apart.

use serde::{Deserialize, Serialize};

use crate::events::DomainEvent;
use crate::types::{Identity, Role};

/// Error code sent when a session token is missing or invalid.
pub const ERROR_UNAUTHORIZED: &str = "UNAUTHORIZED";

/// Error code sent when the identity provider cannot be reached.
pub const ERROR_AUTH_UNAVAILABLE: &str = "AUTH_UNAVAILABLE";

/// Close code used when the gateway drops a socket whose session ended.
pub const CLOSE_UNAUTHORIZED: u16 = 4401;

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Heartbeat.
    Ping,
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// The connection is authenticated and registered.
    #[serde(rename_all = "camelCase")]
    Connected {
        /// Authenticated user ID.
        user_id: String,
        /// Authenticated role.
        role: Role,
    },

    /// A domain event.
    Event(DomainEvent),

    /// Heartbeat response.
    Pong,

    /// Error message.
    Error {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
    },
}

impl ServerMessage {
    /// Creates a connected acknowledgement.
    #[must_use]
    pub fn connected(identity: &Identity) -> Self {
        Self::Connected {
            user_id: identity.user_id.clone(),
            role: identity.role,
        }
    }

    /// Creates an event message.
    #[must_use]
    pub const fn event(event: DomainEvent) -> Self {
        Self::Event(event)
    }

    /// Creates an error message.
    #[must_use]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a pong message.
    #[must_use]
    pub const fn pong() -> Self {
        Self::Pong
    }

    /// Returns true if this is an authentication error.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Error { code, .. } if code == ERROR_UNAUTHORIZED)
    }
}
