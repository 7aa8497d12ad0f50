//! WebSocket client for the realtime gateway.
//!
//! The [`SocketManager`] owns the single gateway connection of a client
//! session: it authenticates with a session token at handshake time,
//! reconnects with bounded linear backoff after transport drops, and fans the
//! received domain events out to subscribers.
//!
//! # Example
//!
//! ```rust,ignore
//! use refundly_sdk::ws::{SocketManager, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = SocketManager::new(WsConfig::new("wss://refunds.example/ws"))?;
//!     let mut events = manager.subscribe();
//!
//!     manager.connect("session-token").await?;
//!
//!     while let Some(signal) = events.recv().await {
//!         println!("Received: {:?}", signal);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod messages;
pub mod state;

pub use client::{EventSubscription, Signal, SocketManager};
pub use config::WsConfig;
pub use error::WsError;
pub use messages::{ClientMessage, ServerMessage};
pub use state::{Backoff, ConnectionState};
