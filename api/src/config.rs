//! Gateway configuration.
//!
//! Read once at startup from the environment:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `API_HOST` | `0.0.0.0` | bind address |
//! | `API_PORT` | `8080` | bind port |
//! | `AUTH_URL` | unset | identity provider session endpoint |
//! | `AUTH_TIMEOUT_MS` | `5000` | identity provider request timeout |
//! | `DEV_SESSIONS` | unset | `token=userId:ROLE,...` fixed sessions |
//! | `INTERNAL_KEY` | unset | shared secret for `POST /events` |
//! | `OUTBOUND_BUFFER` | `64` | per-connection outbound queue size |

use std::collections::HashMap;
use std::time::Duration;

use refundly_sdk::{Identity, Role};

/// Default per-connection outbound queue size.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Default identity provider timeout.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Identity provider endpoint validating session tokens.
    pub auth_url: Option<String>,

    /// Identity provider request timeout.
    pub auth_timeout: Duration,

    /// Fixed sessions, token to identity.
    pub dev_sessions: HashMap<String, Identity>,

    /// Shared secret required on `POST /events`.
    pub internal_key: Option<String>,

    /// Per-connection outbound queue size.
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            auth_url: None,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            dev_sessions: HashMap::new(),
            internal_key: None,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration bound to `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Sets the identity provider endpoint.
    #[must_use]
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    /// Adds a fixed session.
    #[must_use]
    pub fn with_dev_session(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.dev_sessions.insert(token.into(), identity);
        self
    }

    /// Sets the internal ingestion key.
    #[must_use]
    pub fn with_internal_key(mut self, key: impl Into<String>) -> Self {
        self.internal_key = Some(key.into());
        self
    }

    /// Sets the per-connection outbound queue size.
    #[must_use]
    pub fn with_outbound_buffer(mut self, size: usize) -> Self {
        self.outbound_buffer = size;
        self
    }

    /// Returns the bind address as `host:port`.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let config = Self {
            host: present("API_HOST").unwrap_or(defaults.host),
            port: match present("API_PORT") {
                Some(raw) => parse_number("API_PORT", &raw)?,
                None => defaults.port,
            },
            auth_url: present("AUTH_URL"),
            auth_timeout: match present("AUTH_TIMEOUT_MS") {
                Some(raw) => Duration::from_millis(parse_number("AUTH_TIMEOUT_MS", &raw)?),
                None => defaults.auth_timeout,
            },
            dev_sessions: match present("DEV_SESSIONS") {
                Some(raw) => parse_sessions(&raw)?,
                None => HashMap::new(),
            },
            internal_key: present("INTERNAL_KEY"),
            outbound_buffer: match present("OUTBOUND_BUFFER") {
                Some(raw) => parse_number("OUTBOUND_BUFFER", &raw)?,
                None => defaults.outbound_buffer,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_url.is_none() && self.dev_sessions.is_empty() {
            return Err(ConfigError::NoSessionSource);
        }

        if let Some(url) = &self.auth_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidAuthUrl(url.clone()));
            }
        }

        if self.outbound_buffer == 0 {
            return Err(ConfigError::InvalidOutboundBuffer);
        }

        if self.auth_timeout.is_zero() {
            return Err(ConfigError::InvalidAuthTimeout);
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}

/// Parses `token=userId:ROLE` pairs separated by commas.
fn parse_sessions(raw: &str) -> Result<HashMap<String, Identity>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = || ConfigError::InvalidSession(entry.to_string());
            let (token, identity) = entry.split_once('=').ok_or_else(invalid)?;
            let (user_id, role) = identity.rsplit_once(':').ok_or_else(invalid)?;
            if token.is_empty() || user_id.is_empty() {
                return Err(invalid());
            }
            let role: Role = role.parse().map_err(|_| invalid())?;
            Ok((token.to_string(), Identity::new(user_id, role)))
        })
        .collect()
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("{name} has an invalid value: {value}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// A `DEV_SESSIONS` entry is malformed.
    #[error("invalid session entry (expected token=userId:ROLE): {0}")]
    InvalidSession(String),

    /// Neither `AUTH_URL` nor `DEV_SESSIONS` is set.
    #[error("no session source configured: set AUTH_URL or DEV_SESSIONS")]
    NoSessionSource,

    /// `AUTH_URL` is not an http(s) URL.
    #[error("AUTH_URL must start with http:// or https://: {0}")]
    InvalidAuthUrl(String),

    /// `OUTBOUND_BUFFER` is zero.
    #[error("OUTBOUND_BUFFER must be > 0")]
    InvalidOutboundBuffer,

    /// `AUTH_TIMEOUT_MS` is zero.
    #[error("AUTH_TIMEOUT_MS must be > 0")]
    InvalidAuthTimeout,
}
