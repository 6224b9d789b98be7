//! Pipeline error model and connection backoff.

use std::time::Duration;

use cinesync_index::IndexError;
use cinesync_state::StateError;
use cinesync_types::config::BackoffPolicy;
use cinesync_types::DocumentError;

use crate::source::SourceError;

/// Failure of a pipeline session or iteration.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A source or sink could not be reached within the configured attempts.
    #[error("could not connect to {target} after {attempts} attempt(s): {reason}")]
    Connect {
        target: &'static str,
        attempts: u32,
        reason: String,
    },

    /// A source query failed mid-iteration.
    #[error("source query failed: {0}")]
    Source(#[from] SourceError),

    /// A transformed document did not pass validation.
    #[error(transparent)]
    Validation(#[from] DocumentError),

    /// A bulk write failed or was partially rejected.
    #[error("bulk load failed: {0}")]
    Load(#[from] IndexError),

    /// Watermarks or status could not be read or persisted.
    #[error("state backend failed: {0}")]
    State(#[from] StateError),

    /// A blocking state task panicked or was cancelled.
    #[error("state task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The run loop was asked to stop.
    #[error("pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    /// `true` if the run loop must stop instead of retrying the next
    /// iteration after the pause.
    ///
    /// Source, validation and load failures only abort the current
    /// iteration; their watermarks stay uncommitted and the same changes
    /// are picked up again.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::State(_) | Self::Task(_)
        )
    }
}

/// Delay before connection attempt `attempt + 1`: `base * 2^(attempt-1)`,
/// capped at `max_delay_ms`.
#[must_use]
pub fn compute_backoff(policy: &BackoffPolicy, attempt: u32) -> Duration {
    let factor = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    let delay_ms = policy.base_delay_ms.saturating_mul(factor);
    Duration::from_millis(delay_ms.min(policy.max_delay_ms))
}
