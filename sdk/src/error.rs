//! SDK error types.
//!
//! Provides error types for parsing wire values.

/// SDK errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    /// Unknown role name.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// Unknown refund status.
    #[error("invalid refund status: {0}")]
    InvalidStatus(String),

    /// Unknown or malformed cache key.
    #[error("invalid cache key: {0}")]
    InvalidCacheKey(String),

    /// Unknown event name.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SdkError::InvalidRole("janitor".to_string());
        assert_eq!(err.to_string(), "invalid role: janitor");
    }

    #[test]
    fn test_error_cache_key() {
        let err = SdkError::InvalidCacheKey("refund:".to_string());
        assert_eq!(err.to_string(), "invalid cache key: refund:");
    }
}
