//! Search index error types.

/// Errors produced by index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Transport failure (connect, timeout, TLS).
    #[error("index request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The index answered with a non-success status.
    #[error("index returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A bulk request was accepted but some items were rejected.
    #[error("bulk write rejected {failed} of {total} documents; first failure: {first_error}")]
    BulkRejected {
        failed: usize,
        total: usize,
        first_error: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected index response: {0}")]
    Decode(String),

    /// Document (de)serialization failed.
    #[error("document serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndexError {
    /// `true` for failures caused by the index being unreachable rather
    /// than by the request itself.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Status { status, .. } => *status == 503,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_rejected_display() {
        let err = IndexError::BulkRejected {
            failed: 2,
            total: 10,
            first_error: "mapper_parsing_exception".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2 of 10"), "got: {msg}");
        assert!(msg.contains("mapper_parsing_exception"));
    }

    #[test]
    fn unavailable_status_is_connectivity() {
        let err = IndexError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_connectivity());
        let err = IndexError::Status {
            status: 400,
            body: String::new(),
        };
        assert!(!err.is_connectivity());
    }
}
