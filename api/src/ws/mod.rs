//! Realtime gateway.
//!
//! Authenticated WebSocket fan-out of domain events to connected clients.
//!
//! # Frames
//!
//! - `connected`: acknowledgement after the socket is registered
//! - `event`: a domain event for this connection's audience
//! - `pong`: heartbeat reply to a client `ping`
//! - `error`: error responses
//!
//! # Audiences
//!
//! - `notification:new`: the notification's user
//! - `refund:new`, `refund:receipt`: staff
//! - `refund:updated`: staff and the refund's owner

pub mod connection;
pub mod gateway;
pub mod handler;
pub mod metrics;
pub mod registry;

pub use connection::{Connection, Delivery};
pub use gateway::{Gateway, GatewaySession};
pub use handler::ws_handler;
pub use metrics::{WsMetrics, WsMetricsSnapshot};
pub use registry::{ConnectionRegistry, FanoutReport, InProcessRegistry};
