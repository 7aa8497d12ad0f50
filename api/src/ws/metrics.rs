//! Gateway metrics tracking.
//!
//! Provides atomic counters for monitoring the realtime gateway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::registry::FanoutReport;

/// Metrics for the realtime gateway.
#[derive(Debug)]
pub struct WsMetrics {
    /// Total connections registered.
    connections_opened: AtomicU64,

    /// Total connections unregistered.
    connections_closed: AtomicU64,

    /// Total rejected handshakes.
    auth_failures: AtomicU64,

    /// Total frames received from clients.
    messages_received: AtomicU64,

    /// Total frames written to sockets.
    messages_sent: AtomicU64,

    /// Total events emitted.
    events_emitted: AtomicU64,

    /// Total event frames queued.
    deliveries: AtomicU64,

    /// Total event frames dropped.
    dropped: AtomicU64,

    /// Total outbound frames that could not be encoded.
    frames_failed: AtomicU64,

    /// Start time for uptime.
    start_time: Instant,
}

impl Default for WsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WsMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            frames_failed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a connection opened.
    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection closed.
    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected handshake.
    pub fn record_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message received.
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message sent.
    pub fn record_message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one fan-out.
    pub fn record_fanout(&self, report: &FanoutReport) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
    }

    /// Records an outbound frame that could not be encoded.
    pub fn record_frame_failed(&self) {
        self.frames_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total connections opened.
    #[must_use]
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    /// Returns the total connections closed.
    #[must_use]
    pub fn connections_closed(&self) -> u64 {
        self.connections_closed.load(Ordering::Relaxed)
    }

    /// Returns the current active connections.
    #[must_use]
    pub fn active_connections(&self) -> u64 {
        self.connections_opened()
            .saturating_sub(self.connections_closed())
    }

    /// Returns the total rejected handshakes.
    #[must_use]
    pub fn auth_failures(&self) -> u64 {
        self.auth_failures.load(Ordering::Relaxed)
    }

    /// Returns the total messages received.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Returns the total messages sent.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Returns the total events emitted.
    #[must_use]
    pub fn events_emitted(&self) -> u64 {
        self.events_emitted.load(Ordering::Relaxed)
    }

    /// Returns the total event frames queued.
    #[must_use]
    pub fn deliveries(&self) -> u64 {
        self.deliveries.load(Ordering::Relaxed)
    }

    /// Returns the total event frames dropped.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the total outbound frames that could not be encoded.
    #[must_use]
    pub fn frames_failed(&self) -> u64 {
        self.frames_failed.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> WsMetricsSnapshot {
        WsMetricsSnapshot {
            connections_opened: self.connections_opened(),
            connections_closed: self.connections_closed(),
            active_connections: self.active_connections(),
            auth_failures: self.auth_failures(),
            messages_received: self.messages_received(),
            messages_sent: self.messages_sent(),
            events_emitted: self.events_emitted(),
            deliveries: self.deliveries(),
            dropped: self.dropped(),
            frames_failed: self.frames_failed(),
            uptime_secs: self.uptime().as_secs(),
        }
    }
}

/// A point-in-time snapshot of gateway metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WsMetricsSnapshot {
    /// Total connections opened.
    pub connections_opened: u64,
    /// Total connections closed.
    pub connections_closed: u64,
    /// Active connections.
    pub active_connections: u64,
    /// Rejected handshakes.
    pub auth_failures: u64,
    /// Frames received.
    pub messages_received: u64,
    /// Frames sent.
    pub messages_sent: u64,
    /// Events emitted.
    pub events_emitted: u64,
    /// Event frames queued.
    pub deliveries: u64,
    /// Event frames dropped.
    pub dropped: u64,
    /// Outbound frames that could not be encoded.
    pub frames_failed: u64,
    /// Uptime in seconds.
    pub uptime_secs: u64,
}
