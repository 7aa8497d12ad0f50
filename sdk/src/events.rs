//! Domain events.
//!
//! A domain event announces a state change that has already been committed by
//! a mutation handler. It carries just enough payload to route it and to
//! derive cache invalidations; it is never a source of truth.
//!
//! # Wire format
//!
//! ```json
//! {"event": "refund:updated", "data": {"refundId": "R123", "ownerId": "u-7", "status": "PAID"}}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SdkError;
use crate::types::RefundStatus;

/// Event type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `notification:new`
    NotificationNew,
    /// `refund:new`
    RefundNew,
    /// `refund:updated`
    RefundUpdated,
    /// `refund:receipt`
    RefundReceipt,
}

impl EventKind {
    /// All event kinds, in wire-name order.
    pub const ALL: [Self; 4] = [
        Self::NotificationNew,
        Self::RefundNew,
        Self::RefundUpdated,
        Self::RefundReceipt,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotificationNew => "notification:new",
            Self::RefundNew => "refund:new",
            Self::RefundUpdated => "refund:updated",
            Self::RefundReceipt => "refund:receipt",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SdkError::UnknownEvent(s.to_string()))
    }
}

/// Who should receive an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Audience {
    /// A single user.
    User(String),
    /// Every staff connection.
    Staff,
    /// Every staff connection plus one user.
    StaffAndUser(String),
}

impl Audience {
    /// Returns true if a connection with this identity is part of the audience.
    #[must_use]
    pub fn includes(&self, user_id: &str, is_staff: bool) -> bool {
        match self {
            Self::User(target) => target == user_id,
            Self::Staff => is_staff,
            Self::StaffAndUser(target) => is_staff || target == user_id,
        }
    }
}

/// A committed state change, published for fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum DomainEvent {
    /// A notification was created for a user.
    #[serde(rename = "notification:new", rename_all = "camelCase")]
    NotificationNew {
        /// Notification ID.
        notification_id: String,
        /// Recipient user ID.
        user_id: String,
    },

    /// A refund request was submitted.
    #[serde(rename = "refund:new", rename_all = "camelCase")]
    RefundNew {
        /// Refund request ID.
        refund_id: String,
        /// Student who owns the request.
        owner_id: String,
    },

    /// A refund request changed status.
    #[serde(rename = "refund:updated", rename_all = "camelCase")]
    RefundUpdated {
        /// Refund request ID.
        refund_id: String,
        /// Student who owns the request.
        owner_id: String,
        /// New status.
        status: RefundStatus,
    },

    /// A receipt was uploaded for a refund request.
    #[serde(rename = "refund:receipt", rename_all = "camelCase")]
    RefundReceipt {
        /// Refund request ID.
        refund_id: String,
        /// Student who owns the request.
        owner_id: String,
    },
}

impl DomainEvent {
    /// Creates a `notification:new` event.
    #[must_use]
    pub fn notification_new(notification_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::NotificationNew {
            notification_id: notification_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Creates a `refund:new` event.
    #[must_use]
    pub fn refund_new(refund_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self::RefundNew {
            refund_id: refund_id.into(),
            owner_id: owner_id.into(),
        }
    }

    /// Creates a `refund:updated` event.
    #[must_use]
    pub fn refund_updated(
        refund_id: impl Into<String>,
        owner_id: impl Into<String>,
        status: RefundStatus,
    ) -> Self {
        Self::RefundUpdated {
            refund_id: refund_id.into(),
            owner_id: owner_id.into(),
            status,
        }
    }

    /// Creates a `refund:receipt` event.
    #[must_use]
    pub fn refund_receipt(refund_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self::RefundReceipt {
            refund_id: refund_id.into(),
            owner_id: owner_id.into(),
        }
    }

    /// Returns the event kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::NotificationNew { .. } => EventKind::NotificationNew,
            Self::RefundNew { .. } => EventKind::RefundNew,
            Self::RefundUpdated { .. } => EventKind::RefundUpdated,
            Self::RefundReceipt { .. } => EventKind::RefundReceipt,
        }
    }

    /// Returns the refund ID, if the event concerns a refund.
    #[must_use]
    pub fn refund_id(&self) -> Option<&str> {
        match self {
            Self::NotificationNew { .. } => None,
            Self::RefundNew { refund_id, .. }
            | Self::RefundUpdated { refund_id, .. }
            | Self::RefundReceipt { refund_id, .. } => Some(refund_id),
        }
    }

    /// Derives the audience from the event type and payload.
    ///
    /// Status changes reach the requester as well as staff, since they change
    /// the student's own view.
    #[must_use]
    pub fn audience(&self) -> Audience {
        match self {
            Self::NotificationNew { user_id, .. } => Audience::User(user_id.clone()),
            Self::RefundNew { .. } | Self::RefundReceipt { .. } => Audience::Staff,
            Self::RefundUpdated { owner_id, .. } => Audience::StaffAndUser(owner_id.clone()),
        }
    }
}
