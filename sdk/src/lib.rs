//! Refundly SDK - realtime client library for the Refundly reimbursement desk.
//!
//! This crate holds the types shared with the gateway and the client half of
//! the realtime layer.
//!
//! # Components
//!
//! - [`types`]: identities, roles and refund statuses
//! - [`events`]: domain events and their audiences
//! - [`ws`]: wire protocol and the [`SocketManager`]
//! - [`cache`]: cache keys, the [`QueryCache`] and the [`InvalidationRouter`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use refundly_sdk::{InvalidationRouter, QueryCache, SocketManager, WsConfig};
//!
//! let manager = SocketManager::new(WsConfig::new("wss://refunds.example/ws"))?;
//! let (cache, mut refetch) = QueryCache::new();
//! let router = InvalidationRouter::new(Arc::new(cache));
//! let _listener = router.attach(&manager);
//!
//! manager.connect(&session_token).await?;
//! while let Some(key) = refetch.recv().await {
//!     // refetch `key`
//! }
//! ```

pub mod cache;
pub mod error;
pub mod events;
pub mod types;
pub mod ws;

pub use cache::{CacheKey, InvalidationRouter, InvalidationTarget, QueryCache};
pub use error::SdkError;
pub use events::{Audience, DomainEvent, EventKind};
pub use types::{Identity, RefundStatus, Role};
pub use ws::{ConnectionState, Signal, SocketManager, WsConfig, WsError};
