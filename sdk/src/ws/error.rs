//! Socket manager errors.

use tokio_tungstenite::tungstenite;

/// Errors returned by the socket manager.
///
/// Only [`WsError::Unauthorized`] asks the user for anything; every
/// retryable variant is handled by background reconnection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WsError {
    /// The gateway could not be reached, or did not acknowledge in time.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The gateway rejected the session token.
    #[error("session rejected by gateway")]
    Unauthorized,

    /// The socket misbehaved after the transport was up.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A client frame could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A gateway frame could not be decoded during the handshake.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The gateway closed the socket before acknowledging it.
    #[error("connection closed")]
    Closed,

    /// The configuration or token cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing to the socket failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A later `disconnect()` or `connect()` cancelled this attempt.
    #[error("connection attempt superseded")]
    Superseded,
}

impl WsError {
    /// Returns true if retrying the same token may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Protocol(_) | Self::Closed | Self::SendFailed(_)
        )
    }
}

impl From<tungstenite::Error> for WsError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
