//! Session token validation.
//!
//! The gateway never mints or refreshes tokens. It asks a
//! [`SessionValidator`] once per connection attempt whether a token belongs to
//! a live session and, if so, whose.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use refundly_sdk::Identity;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::ServerConfig;

/// Identity provider errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The HTTP client could not be built.
    #[error("failed to build identity client: {0}")]
    Client(String),

    /// The identity provider could not be reached or failed.
    #[error("identity provider unreachable: {0}")]
    Unavailable(String),

    /// The identity provider answered with an unreadable body.
    #[error("unexpected identity provider response: {0}")]
    InvalidResponse(String),
}

/// Resolves session tokens to identities.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Returns the identity behind `token`, or `None` if the token is not a
    /// live session.
    async fn validate(&self, token: &str) -> Result<Option<Identity>, AuthError>;
}

/// Validates tokens against the identity provider's session endpoint.
///
/// `GET {url}` with the token as bearer credential: `200` carries the
/// identity, `401`/`403` mean the token is invalid, and anything else is an
/// outage.
#[derive(Debug, Clone)]
pub struct HttpSessionValidator {
    url: String,
    http: reqwest::Client,
}

impl HttpSessionValidator {
    /// Creates a validator for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Client(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http,
        })
    }

    /// Returns the session endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SessionValidator for HttpSessionValidator {
    async fn validate(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        let response = self
            .http
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let identity = response
                    .json::<Identity>()
                    .await
                    .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
                debug!(user_id = %identity.user_id, role = %identity.role, "session validated");
                Ok(Some(identity))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => {
                warn!(%status, "identity provider failed");
                Err(AuthError::Unavailable(format!("status {}", status)))
            }
        }
    }
}

/// Validates tokens against a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticSessionValidator {
    sessions: HashMap<String, Identity>,
}

impl StaticSessionValidator {
    /// Creates a validator from a token table.
    #[must_use]
    pub fn new(sessions: HashMap<String, Identity>) -> Self {
        Self { sessions }
    }

    /// Adds a session.
    #[must_use]
    pub fn with_session(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.sessions.insert(token.into(), identity);
        self
    }

    /// Returns the number of known sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no session is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionValidator for StaticSessionValidator {
    async fn validate(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.sessions.get(token).cloned())
    }
}

/// Builds the validator selected by `config`.
///
/// `AUTH_URL` wins over `DEV_SESSIONS` when both are set.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created.
pub fn validator_from_config(config: &ServerConfig) -> Result<Arc<dyn SessionValidator>, AuthError> {
    match &config.auth_url {
        Some(url) => {
            if !config.dev_sessions.is_empty() {
                warn!("AUTH_URL is set, ignoring DEV_SESSIONS");
            }
            Ok(Arc::new(HttpSessionValidator::new(
                url.clone(),
                config.auth_timeout,
            )?))
        }
        None => {
            let validator = StaticSessionValidator::new(config.dev_sessions.clone());
            if validator.is_empty() {
                warn!("no development sessions configured, every connection will be rejected");
            } else {
                warn!(sessions = validator.len(), "using fixed development sessions");
            }
            Ok(Arc::new(validator))
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};
    use refundly_sdk::Role;
    use tokio::net::TcpListener;

    use super::*;

    async fn session(headers: HeaderMap) -> Result<Json<Identity>, axum::http::StatusCode> {
        let bearer = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        match bearer {
            "Bearer student-token" => Ok(Json(Identity::new("u-1", Role::Student))),
            "Bearer banned-token" => Err(axum::http::StatusCode::FORBIDDEN),
            "Bearer broken-token" => Err(axum::http::StatusCode::INTERNAL_SERVER_ERROR),
            _ => Err(axum::http::StatusCode::UNAUTHORIZED),
        }
    }

    async fn spawn_identity_provider() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = Router::new().route("/session", get(session));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}/session", addr)
    }

    #[tokio::test]
    async fn test_static_validator() {
        let validator = StaticSessionValidator::default()
            .with_session("t-1", Identity::new("u-1", Role::Staff));

        assert_eq!(validator.len(), 1);
        assert_eq!(
            validator.validate("t-1").await,
            Ok(Some(Identity::new("u-1", Role::Staff)))
        );
        assert_eq!(validator.validate("t-2").await, Ok(None));
    }

    #[tokio::test]
    async fn test_http_validator_accepts_live_session() {
        let url = spawn_identity_provider().await;
        let validator = HttpSessionValidator::new(url, Duration::from_secs(2)).expect("validator");

        let identity = validator.validate("student-token").await.expect("validate");
        assert_eq!(identity, Some(Identity::new("u-1", Role::Student)));
    }

    #[tokio::test]
    async fn test_http_validator_rejects_unknown_and_forbidden() {
        let url = spawn_identity_provider().await;
        let validator = HttpSessionValidator::new(url, Duration::from_secs(2)).expect("validator");

        assert_eq!(validator.validate("expired-token").await, Ok(None));
        assert_eq!(validator.validate("banned-token").await, Ok(None));
    }

    #[tokio::test]
    async fn test_http_validator_reports_outage() {
        let url = spawn_identity_provider().await;
        let validator = HttpSessionValidator::new(url, Duration::from_secs(2)).expect("validator");

        let result = validator.validate("broken-token").await;
        assert!(matches!(result, Err(AuthError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_http_validator_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let validator = HttpSessionValidator::new(
            format!("http://{}/session", addr),
            Duration::from_millis(500),
        )
        .expect("validator");

        let result = validator.validate("student-token").await;
        assert!(matches!(result, Err(AuthError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_validator_from_config() {
        let config = ServerConfig::default()
            .with_dev_session("t", Identity::new("u", Role::Student));
        assert!(validator_from_config(&config).is_ok());

        let config = config.with_auth_url("http://127.0.0.1:1/session");
        assert!(validator_from_config(&config).is_ok());
    }
}
