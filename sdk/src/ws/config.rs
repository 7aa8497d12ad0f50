//! WebSocket configuration.
//!
//! Provides configuration options for the socket manager.

use std::time::Duration;

use super::error::WsError;

/// Default gateway URL.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8080/ws";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 25;

/// Default reconnect step in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

/// Default reconnect delay ceiling in milliseconds.
pub const MAX_RECONNECT_DELAY_MS: u64 = 5_000;

/// Default maximum reconnection attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default handshake acknowledgement timeout in seconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Default capacity of the event fan-out buffer.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// WebSocket configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Gateway URL.
    pub url: String,

    /// Heartbeat interval.
    pub heartbeat_interval: Duration,

    /// Reconnect step; attempt `n` waits `n * reconnect_delay`.
    pub reconnect_delay: Duration,

    /// Ceiling for the reconnect delay.
    pub max_reconnect_delay: Duration,

    /// Maximum reconnection attempts after a drop.
    pub max_reconnect_attempts: u32,

    /// Deadline for the upgrade plus the gateway's `connected` acknowledgement.
    pub handshake_timeout: Duration,

    /// Capacity of the event buffer shared by subscribers.
    pub event_buffer: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_reconnect_delay: Duration::from_millis(MAX_RECONNECT_DELAY_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl WsConfig {
    /// Creates a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the reconnect step.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the reconnect delay ceiling.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the event buffer capacity.
    #[must_use]
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.url.is_empty() {
            return Err(WsError::InvalidConfig("url cannot be empty".to_string()));
        }

        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(WsError::InvalidConfig(
                "url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(WsError::InvalidConfig(
                "heartbeat_interval must be > 0".to_string(),
            ));
        }

        if self.reconnect_delay.is_zero() {
            return Err(WsError::InvalidConfig(
                "reconnect_delay must be > 0".to_string(),
            ));
        }

        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(WsError::InvalidConfig(
                "max_reconnect_delay must be >= reconnect_delay".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(WsError::InvalidConfig(
                "event_buffer must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
