//! Refundly API - realtime gateway for the Refundly reimbursement desk.
//!
//! Authenticates WebSocket clients against the identity provider and pushes
//! domain events (refund requests, status changes, receipts, notifications)
//! to the connections that should see them.
//!
//! # Components
//!
//! - [`config`]: environment configuration
//! - [`auth`]: session token validation
//! - [`ws`]: connection registry, fan-out and the socket handler
//! - [`server`]: axum router and HTTP server
//! - [`error`]: HTTP-facing errors

pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod ws;

pub use auth::{
    validator_from_config, AuthError, HttpSessionValidator, SessionValidator,
    StaticSessionValidator,
};
pub use config::{ConfigError, ServerConfig};
pub use error::GatewayError;
pub use server::{router, Server};
pub use state::AppState;
pub use ws::{ConnectionRegistry, FanoutReport, Gateway, InProcessRegistry, WsMetrics};
