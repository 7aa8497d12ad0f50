//! Core types for the Refundly SDK.
//!
//! Identity and refund types shared by the gateway and its clients.

pub mod identity;
pub mod refund;

pub use identity::{Identity, Role};
pub use refund::RefundStatus;
