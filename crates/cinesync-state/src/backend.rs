//! State backend trait definition.
//!
//! [`StateBackend`] is a flat key/value contract: each key maps to one JSON
//! value. Watermark and status helpers on top of it live in
//! [`crate::watermark`].

use serde_json::Value;

use crate::error;

/// Storage contract for ETL state.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn StateBackend>`.
/// A successful `set_state` must be durable: a crash afterwards never loses
/// the value, and a crash during the write leaves the previous value intact.
pub trait StateBackend: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` when nothing has been persisted for the key yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_state(&self, key: &str) -> error::Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn set_state(&self, key: &str, value: Value) -> error::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn StateBackend`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn StateBackend) {}
    }
}
