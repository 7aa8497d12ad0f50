//! Refundly realtime layer.
//!
//! Mutation handlers publish domain events to the [`gateway`], which fans them
//! out over authenticated WebSockets. On the client side the [`client`] socket
//! manager owns the connection and the invalidation router turns every event
//! into cache-key invalidations.
//!
//! - [`gateway`]: realtime gateway (`refundly-api`)
//! - [`client`]: socket manager, protocol and query cache (`refundly-sdk`)

pub use refundly_api as gateway;
pub use refundly_sdk as client;
