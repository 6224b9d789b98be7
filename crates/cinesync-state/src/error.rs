//! State backend error types.

/// Errors produced by [`StateBackend`](crate::StateBackend) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure (reading, writing or renaming the state file).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The state file or a stored value is not valid JSON.
    #[error("corrupt state: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// A stored value has the wrong shape for the requested key.
    #[error("invalid value for state key '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Internal mutex was poisoned by a panicked thread.
    #[error("state backend lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;
