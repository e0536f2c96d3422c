//! Unified error types for the caching subsystem.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for Strata.
///
/// Steady-state store failures are absorbed by the coordinator and only
/// surface through logs, metrics, and health checks; the variants here let
/// the adapters report precisely what went wrong so the coordinator can
/// apply the right policy.
#[derive(Error, Debug)]
pub enum StrataError {
    // ============ Store Errors ============
    /// Fast tier unreachable or a fast-tier command failed.
    #[error("Fast store error: {0}")]
    FastStore(String),

    /// Durable tier unreachable or a durable-tier statement failed.
    #[error("Durable store error: {0}")]
    DurableStore(String),

    /// Durable tier refused a write on quota/streaming limits.
    ///
    /// Soft by contract: the write path treats this like a transient
    /// failure, never as a reason to fail the producer call.
    #[error("Durable store rejected write: {0}")]
    QuotaRejected(String),

    /// A stored blob failed to deserialize into its record type.
    #[error("Malformed record at '{key}': {message}")]
    MalformedRecord { key: String, message: String },

    // ============ Infrastructure Errors ============
    /// An adapter-bounded operation exceeded its latency bound.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Invalid or missing configuration. Fatal, raised once at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StrataError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::FastStore(_) => "FAST_STORE_ERROR",
            Self::DurableStore(_) => "DURABLE_STORE_ERROR",
            Self::QuotaRejected(_) => "QUOTA_REJECTED",
            Self::MalformedRecord { .. } => "MALFORMED_RECORD",
            Self::Timeout(_) => "TIMEOUT",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a fast-store error.
    #[must_use]
    pub fn fast_store<T: Into<String>>(message: T) -> Self {
        Self::FastStore(message.into())
    }

    /// Creates a durable-store error.
    #[must_use]
    pub fn durable_store<T: Into<String>>(message: T) -> Self {
        Self::DurableStore(message.into())
    }

    /// Creates a malformed-record error.
    #[must_use]
    pub fn malformed<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::MalformedRecord {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout<T: Into<String>>(message: T) -> Self {
        Self::Timeout(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if this error is a transient tier failure.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FastStore(_) | Self::DurableStore(_) | Self::Timeout(_)
        )
    }

    /// Checks if this error is an acceptable durable-write failure.
    ///
    /// Quota rejections and transient tier failures are absorbed on the
    /// write path; only configuration and internal errors fall outside the
    /// soft set.
    #[must_use]
    pub const fn is_soft_write_failure(&self) -> bool {
        matches!(self, Self::QuotaRejected(_)) || self.is_transient()
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for StrataError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                // Postgres classes 53 (insufficient resources) and 54
                // (program limit exceeded) are the quota-style rejections
                if let Some(code) = db_err.code() {
                    if code.starts_with("53") || code.starts_with("54") {
                        return Self::QuotaRejected(db_err.message().to_string());
                    }
                }
                Self::DurableStore(err.to_string())
            }
            sqlx::Error::PoolTimedOut => {
                Self::Timeout("durable store connection acquire".to_string())
            }
            _ => Self::DurableStore(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            StrataError::fast_store("down").error_code(),
            "FAST_STORE_ERROR"
        );
        assert_eq!(
            StrataError::durable_store("down").error_code(),
            "DURABLE_STORE_ERROR"
        );
        assert_eq!(
            StrataError::QuotaRejected("limit".to_string()).error_code(),
            "QUOTA_REJECTED"
        );
        assert_eq!(
            StrataError::malformed("k", "bad json").error_code(),
            "MALFORMED_RECORD"
        );
        assert_eq!(
            StrataError::configuration("missing url").error_code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(StrataError::timeout("GET").error_code(), "TIMEOUT");
        assert_eq!(StrataError::internal("oops").error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_transient_errors() {
        assert!(StrataError::fast_store("connection refused").is_transient());
        assert!(StrataError::durable_store("connection reset").is_transient());
        assert!(StrataError::timeout("SET").is_transient());
        assert!(!StrataError::configuration("missing url").is_transient());
        assert!(!StrataError::malformed("k", "m").is_transient());
    }

    #[test]
    fn test_soft_write_failures() {
        assert!(StrataError::QuotaRejected("streaming limit".to_string()).is_soft_write_failure());
        assert!(StrataError::durable_store("down").is_soft_write_failure());
        assert!(!StrataError::internal("bug").is_soft_write_failure());
        assert!(!StrataError::configuration("missing url").is_soft_write_failure());
    }

    #[test]
    fn test_error_display() {
        let err = StrataError::malformed("strata:cache:metadata:a:b", "expected struct");
        let rendered = err.to_string();
        assert!(rendered.contains("strata:cache:metadata:a:b"));
        assert!(rendered.contains("expected struct"));
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StrataError = parse_err.into();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }
}
