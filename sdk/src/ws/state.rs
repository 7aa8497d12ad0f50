//! Connection state machine and reconnection backoff.

use std::fmt;
use std::time::Duration;

use super::config::WsConfig;

/// Lifecycle state of the socket manager.
///
/// ```text
/// Disconnected --connect--> Connecting{0} --ack--> Connected
///      ^                        |   ^                  |
///      |                  401   |   | retry      drop  |
///      |                        v   |                  v
///      +--- attempts spent --- Connecting{n} <---------+
///                               |
///                         401   v
///                        Reauthenticating
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No socket and no pending retry.
    #[default]
    Disconnected,
    /// Opening a socket. `attempt` is 0 for the first attempt of a session and
    /// counts reconnection attempts after that.
    Connecting {
        /// Reconnection attempt number.
        attempt: u32,
    },
    /// Socket open and acknowledged by the gateway.
    Connected,
    /// The gateway rejected the session token; waiting for a fresh one.
    Reauthenticating,
}

impl ConnectionState {
    /// Returns true if connected.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if the manager is idle and will not act on its own.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Reauthenticating)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting { attempt } => write!(f, "connecting (attempt {})", attempt),
            Self::Connected => write!(f, "connected"),
            Self::Reauthenticating => write!(f, "reauthenticating"),
        }
    }
}

/// Linear backoff with a ceiling and a bounded attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    step: Duration,
    ceiling: Duration,
    max_attempts: u32,
}

impl Backoff {
    /// Creates a new backoff policy.
    #[must_use]
    pub const fn new(step: Duration, ceiling: Duration, max_attempts: u32) -> Self {
        Self {
            step,
            ceiling,
            max_attempts,
        }
    }

    /// Creates the policy described by a socket configuration.
    #[must_use]
    pub const fn from_config(config: &WsConfig) -> Self {
        Self::new(
            config.reconnect_delay,
            config.max_reconnect_delay,
            config.max_reconnect_attempts,
        )
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay before the given attempt (1-based), or `None` once
    /// the attempt budget is spent.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        Some(self.step.saturating_mul(attempt).min(self.ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_state_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting { attempt: 1 }.is_connected());
        assert!(ConnectionState::Disconnected.is_terminal());
        assert!(ConnectionState::Reauthenticating.is_terminal());
        assert!(!ConnectionState::Connecting { attempt: 0 }.is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            ConnectionState::Connecting { attempt: 2 }.to_string(),
            "connecting (attempt 2)"
        );
    }

    #[test]
    fn test_backoff_is_linear_until_ceiling() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(250), 5);
        assert_eq!(backoff.delay(1), Some(Duration::from_millis(100)));
        assert_eq!(backoff.delay(2), Some(Duration::from_millis(200)));
        assert_eq!(backoff.delay(3), Some(Duration::from_millis(250)));
        assert_eq!(backoff.delay(5), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_backoff_stops_after_max_attempts() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1), 3);
        assert!(backoff.delay(3).is_some());
        assert_eq!(backoff.delay(4), None);
        assert_eq!(backoff.delay(u32::MAX), None);
        assert_eq!(backoff.delay(0), None);
    }

    #[test]
    fn test_backoff_never_exceeds_ceiling() {
        let ceiling = Duration::from_secs(2);
        let backoff = Backoff::new(Duration::from_millis(700), ceiling, 1_000);
        let exceeded = (1..=backoff.max_attempts())
            .filter_map(|attempt| backoff.delay(attempt))
            .any(|delay| delay > ceiling);
        assert!(!exceeded);
    }

    #[test]
    fn test_backoff_from_config() {
        let config = WsConfig::default()
            .with_reconnect_delay(Duration::from_millis(10))
            .with_max_reconnect_delay(Duration::from_millis(15))
            .with_max_reconnect_attempts(2);
        let backoff = Backoff::from_config(&config);
        assert_eq!(backoff.delay(2), Some(Duration::from_millis(15)));
        assert_eq!(backoff.delay(3), None);
    }
}
