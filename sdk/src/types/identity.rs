//! Identity types shared by the gateway and its clients.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SdkError;

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Student submitting refund requests.
    Student,
    /// Staff member reviewing refund requests.
    Staff,
    /// Administrator.
    Admin,
}

impl Role {
    /// Returns true if this role receives staff-wide events.
    ///
    /// Admins see everything staff see.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Staff => "STAFF",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Self::Student),
            "STAFF" => Ok(Self::Staff),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(SdkError::InvalidRole(s.to_string())),
        }
    }
}

/// The identity behind a validated session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// User ID.
    pub user_id: String,
    /// Role.
    pub role: Role,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_is_staff() {
        assert!(!Role::Student.is_staff());
        assert!(Role::Staff.is_staff());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("STAFF".parse::<Role>(), Ok(Role::Staff));
        assert_eq!("student".parse::<Role>(), Ok(Role::Student));
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_identity_wire_format() {
        let identity = Identity::new("u-1", Role::Student);
        let json = serde_json::to_string(&identity).expect("serialize");
        assert_eq!(json, r#"{"userId":"u-1","role":"STUDENT"}"#);
    }
}
