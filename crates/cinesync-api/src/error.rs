//! Read-path error types.

use std::time::Duration;

use cinesync_index::IndexError;

/// Cache store failures. Services log these and fall back to the index.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache call timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned to read-path callers.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Page number or size outside the accepted range.
    #[error("invalid pagination: {0}")]
    InvalidPage(String),

    /// A filter was given for a resource that has none.
    #[error("{resource} lists do not support filtering")]
    UnsupportedFilter { resource: &'static str },

    /// An index document did not match the resource's shape.
    #[error("malformed {resource} document from index: {reason}")]
    Decode {
        resource: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_filter_names_resource() {
        let err = ServiceError::UnsupportedFilter { resource: "genre" };
        assert_eq!(err.to_string(), "genre lists do not support filtering");
    }

    #[test]
    fn timeout_display() {
        let err = CacheError::Timeout(Duration::from_millis(500));
        assert!(err.to_string().contains("500ms"));
    }
}
