//! Gateway error types.
//!
//! Errors surfaced over HTTP. Each maps to a status code and an `error` frame
//! body, so a client that cannot complete the upgrade still reads the same
//! shape it would have received over the socket.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use refundly_sdk::ws::messages::{ERROR_AUTH_UNAVAILABLE, ERROR_UNAUTHORIZED};
use refundly_sdk::ws::ServerMessage;

/// Gateway errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// No session token was presented.
    #[error("missing session token")]
    MissingToken,

    /// The identity provider rejected the token.
    #[error("invalid session token")]
    InvalidToken,

    /// The identity provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    AuthUnavailable(String),

    /// The caller may not use this endpoint.
    #[error("forbidden")]
    Forbidden,
}

impl GatewayError {
    /// Returns the HTTP status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::AuthUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Returns the error code carried in the `error` frame.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingToken | Self::InvalidToken => ERROR_UNAUTHORIZED,
            Self::AuthUnavailable(_) => ERROR_AUTH_UNAVAILABLE,
            Self::Forbidden => "FORBIDDEN",
        }
    }

    /// Returns the error as an `error` frame.
    #[must_use]
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::error(self.code(), self.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_message())).into_response()
    }
}
