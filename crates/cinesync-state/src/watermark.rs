//! Typed access to watermarks and the ETL process status.
//!
//! Watermarks are stored as RFC 3339 strings under the keys of
//! [`WatermarkKey`]; the process status is stored under
//! [`ETL_PROCESS_KEY`].

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use cinesync_types::state::{EtlStatus, WatermarkKey, ETL_PROCESS_KEY};
use serde_json::Value;

use crate::backend::StateBackend;
use crate::error::{self, StateError};

/// Format a watermark for storage, keeping sub-second precision.
#[must_use]
pub fn format_watermark(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Read one watermark. `None` means "beginning of time".
///
/// # Errors
///
/// Returns [`StateError::InvalidValue`] if the stored value is not an
/// RFC 3339 string, or the backend's error on storage failure.
pub fn get_watermark(
    backend: &dyn StateBackend,
    key: WatermarkKey,
) -> error::Result<Option<DateTime<Utc>>> {
    let Some(value) = backend.get_state(key.as_str())? else {
        return Ok(None);
    };
    let invalid = |reason: String| StateError::InvalidValue {
        key: key.as_str().to_string(),
        reason,
    };
    let raw = value
        .as_str()
        .ok_or_else(|| invalid(format!("expected a timestamp string, got {value}")))?;
    let ts = DateTime::parse_from_rfc3339(raw).map_err(|e| invalid(format!("{raw}: {e}")))?;
    Ok(Some(ts.with_timezone(&Utc)))
}

/// Persist one watermark.
///
/// # Errors
///
/// Returns the backend's error on storage failure.
pub fn set_watermark(
    backend: &dyn StateBackend,
    key: WatermarkKey,
    ts: DateTime<Utc>,
) -> error::Result<()> {
    backend.set_state(key.as_str(), Value::String(format_watermark(ts)))
}

/// Read the recorded process status, if any.
///
/// # Errors
///
/// Returns [`StateError::InvalidValue`] for an unknown status string.
pub fn get_status(backend: &dyn StateBackend) -> error::Result<Option<EtlStatus>> {
    let Some(value) = backend.get_state(ETL_PROCESS_KEY)? else {
        return Ok(None);
    };
    let status = value
        .as_str()
        .ok_or_else(|| format!("expected a status string, got {value}"))
        .and_then(str::parse::<EtlStatus>)
        .map_err(|reason| StateError::InvalidValue {
            key: ETL_PROCESS_KEY.to_string(),
            reason,
        })?;
    Ok(Some(status))
}

/// Record the process status.
///
/// # Errors
///
/// Returns the backend's error on storage failure.
pub fn set_status(backend: &dyn StateBackend, status: EtlStatus) -> error::Result<()> {
    backend.set_state(ETL_PROCESS_KEY, Value::String(status.as_str().to_string()))
}

/// In-memory snapshot of all watermarks, loaded once per iteration.
///
/// Advancing a watermark here does not persist it; callers commit the
/// keys of one sub-pipeline with [`Watermarks::commit`] after the load
/// succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermarks {
    values: HashMap<WatermarkKey, DateTime<Utc>>,
}

impl Watermarks {
    /// Load every known watermark from `backend`.
    ///
    /// # Errors
    ///
    /// Propagates [`get_watermark`] failures.
    pub fn load(backend: &dyn StateBackend) -> error::Result<Self> {
        let mut values = HashMap::new();
        for key in WatermarkKey::ALL {
            if let Some(ts) = get_watermark(backend, key)? {
                values.insert(key, ts);
            }
        }
        Ok(Self { values })
    }

    /// Current value, `None` meaning "beginning of time".
    #[must_use]
    pub fn get(&self, key: WatermarkKey) -> Option<DateTime<Utc>> {
        self.values.get(&key).copied()
    }

    /// Move `key` forward to `ts`. Returns `false` and leaves the value
    /// untouched if `ts` is older than the current watermark.
    pub fn advance(&mut self, key: WatermarkKey, ts: DateTime<Utc>) -> bool {
        match self.values.get(&key) {
            Some(current) if *current > ts => {
                tracing::warn!(
                    key = key.as_str(),
                    current = %format_watermark(*current),
                    proposed = %format_watermark(ts),
                    "Refusing to move watermark backwards"
                );
                false
            }
            _ => {
                self.values.insert(key, ts);
                true
            }
        }
    }

    /// Persist the listed keys that have a value.
    ///
    /// # Errors
    ///
    /// Returns the first storage failure; keys before it remain committed.
    pub fn commit(&self, backend: &dyn StateBackend, keys: &[WatermarkKey]) -> error::Result<()> {
        for key in keys {
            if let Some(ts) = self.get(*key) {
                set_watermark(backend, *key, ts)?;
                tracing::info!(key = key.as_str(), watermark = %format_watermark(ts), "Watermark committed");
            }
        }
        Ok(())
    }
}
