//! Error types for feedline operations

use thiserror::Error;

/// Cursor and page-size parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("Malformed cursor {param}={value:?}: {reason}")]
    MalformedTimestamp {
        param: String,
        value: String,
        reason: String,
    },

    #[error("Invalid page size {value:?}: {reason}")]
    InvalidPageSize { value: String, reason: String },
}

/// Remote list/counter cache errors. Always recovered locally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache entry could not be decoded: {reason}")]
    Codec { reason: String },
}

/// Authoritative store errors. Always propagated to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Backing store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Entity not found: {entity}")]
    NotFound { entity: String },

    #[error("Write failed: {reason}")]
    WriteFailed { reason: String },
}

/// Counter reconciliation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconciliationError {
    #[error("Failed to persist reconciled counter {key}: {reason}")]
    WriteFailed { key: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all feedline errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Reconciliation error: {0}")]
    Reconciliation(#[from] ReconciliationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl FeedError {
    /// Shorthand for `CacheError::Unavailable`.
    pub fn cache_unavailable(reason: impl Into<String>) -> Self {
        Self::Cache(CacheError::Unavailable {
            reason: reason.into(),
        })
    }

    /// Shorthand for `StorageError::Unavailable`.
    pub fn storage_unavailable(reason: impl Into<String>) -> Self {
        Self::Storage(StorageError::Unavailable {
            reason: reason.into(),
        })
    }

    /// True for errors raised by the cache layer, which callers recover from
    /// by taking the authoritative path.
    pub fn is_cache_failure(&self) -> bool {
        matches!(self, Self::Cache(_))
    }

    /// True for errors raised by the authoritative store.
    pub fn is_authoritative_failure(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias for feedline operations.
pub type FeedResult<T> = Result<T, FeedError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_error_display() {
        let err = CursorError::MalformedTimestamp {
            param: "created_at__lt".to_string(),
            value: "yesterday".to_string(),
            reason: "input contains invalid characters".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("created_at__lt"));
        assert!(msg.contains("\"yesterday\""));
    }

    #[test]
    fn test_cache_error_converts_and_classifies() {
        let err: FeedError = CacheError::Unavailable {
            reason: "connection refused".to_string(),
        }
        .into();
        assert!(err.is_cache_failure());
        assert!(!err.is_authoritative_failure());
        assert!(format!("{}", err).contains("connection refused"));
    }

    #[test]
    fn test_storage_error_classifies_as_authoritative() {
        let err = FeedError::storage_unavailable("db down");
        assert!(err.is_authoritative_failure());
        assert!(!err.is_cache_failure());
        assert_eq!(
            err,
            FeedError::Storage(StorageError::Unavailable {
                reason: "db down".to_string()
            })
        );
    }

    #[test]
    fn test_reconciliation_error_display() {
        let err = ReconciliationError::WriteFailed {
            key: "tweet.likes_count:1".to_string(),
            reason: "deadlock".to_string(),
        };
        let msg = format!("{}", FeedError::from(err));
        assert!(msg.contains("Reconciliation error"));
        assert!(msg.contains("tweet.likes_count:1"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "trust_cap".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("trust_cap"));
        assert!(msg.contains("must be positive"));
    }
}
