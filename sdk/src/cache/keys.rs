//! Cache keys.
//!
//! Every query result the dashboard caches is addressed by one of these keys.
//! The string forms are shared with string-keyed caches on the view side.

use std::fmt;
use std::str::FromStr;

use crate::error::SdkError;

/// Identity of a cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// The current user's notification list.
    Notifications,
    /// Unread notification badge count.
    NotificationCount,
    /// Refund request lists (student and staff).
    Refunds,
    /// Per-tab counters on the staff dashboard.
    StaffTabCounts,
    /// A student's refund history.
    StudentHistory,
    /// Reporting aggregates.
    Analytics,
    /// A single refund request.
    Refund(String),
    /// The audit trail of a single refund request.
    AuditLogs(String),
}

impl CacheKey {
    /// Keys that take no parameter.
    pub const STATIC: [Self; 6] = [
        Self::Notifications,
        Self::NotificationCount,
        Self::Refunds,
        Self::StaffTabCounts,
        Self::StudentHistory,
        Self::Analytics,
    ];

    /// Creates a single-refund key.
    #[must_use]
    pub fn refund(refund_id: impl Into<String>) -> Self {
        Self::Refund(refund_id.into())
    }

    /// Creates an audit-log key.
    #[must_use]
    pub fn audit_logs(refund_id: impl Into<String>) -> Self {
        Self::AuditLogs(refund_id.into())
    }

    /// Returns the key's root segment.
    #[must_use]
    pub const fn root(&self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::NotificationCount => "notificationCount",
            Self::Refunds => "refunds",
            Self::StaffTabCounts => "staffTabCounts",
            Self::StudentHistory => "student-history",
            Self::Analytics => "analytics",
            Self::Refund(_) => "refund",
            Self::AuditLogs(_) => "auditLogs",
        }
    }

    /// Returns the key's parameter, if any.
    #[must_use]
    pub fn param(&self) -> Option<&str> {
        match self {
            Self::Refund(id) | Self::AuditLogs(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.param() {
            Some(param) => write!(f, "{}:{}", self.root(), param),
            None => f.write_str(self.root()),
        }
    }
}

impl FromStr for CacheKey {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SdkError::InvalidCacheKey(s.to_string());

        match s.split_once(':') {
            Some((root, id)) if !id.is_empty() => match root {
                "refund" => Ok(Self::refund(id)),
                "auditLogs" => Ok(Self::audit_logs(id)),
                _ => Err(invalid()),
            },
            Some(_) => Err(invalid()),
            None => Self::STATIC
                .into_iter()
                .find(|key| key.root() == s)
                .ok_or_else(invalid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_key_names() {
        let names: Vec<String> = CacheKey::STATIC.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "notifications",
                "notificationCount",
                "refunds",
                "staffTabCounts",
                "student-history",
                "analytics",
            ]
        );
    }

    #[test]
    fn test_parameterized_key_names() {
        assert_eq!(CacheKey::refund("R123").to_string(), "refund:R123");
        assert_eq!(CacheKey::audit_logs("R123").to_string(), "auditLogs:R123");
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!("refunds".parse::<CacheKey>(), Ok(CacheKey::Refunds));
        assert_eq!(
            "student-history".parse::<CacheKey>(),
            Ok(CacheKey::StudentHistory)
        );
        assert_eq!(
            "auditLogs:R9".parse::<CacheKey>(),
            Ok(CacheKey::audit_logs("R9"))
        );
    }

    #[test]
    fn test_parse_rejects_typos() {
        assert!("refund".parse::<CacheKey>().is_err());
        assert!("refund:".parse::<CacheKey>().is_err());
        assert!("studentHistory".parse::<CacheKey>().is_err());
        assert!("refunds:R1".parse::<CacheKey>().is_err());
    }
}
