//! Connection establishment with exponential backoff.

use std::fmt::Display;
use std::future::Future;

use cinesync_types::config::BackoffPolicy;

use crate::errors::{compute_backoff, PipelineError};

/// Call `connect` until it succeeds or `policy.max_attempts` is spent.
///
/// # Errors
///
/// Returns [`PipelineError::Connect`] carrying the last failure once every
/// attempt has failed.
pub async fn connect_with_backoff<T, E, F, Fut>(
    target: &'static str,
    policy: &BackoffPolicy,
    mut connect: F,
) -> Result<T, PipelineError>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        tracing::debug!(target_name = target, attempt, "Connecting");
        match connect().await {
            Ok(conn) => {
                if attempt > 1 {
                    tracing::info!(target_name = target, attempt, "Connected after retry");
                }
                return Ok(conn);
            }
            Err(err) if attempt < max_attempts => {
                let delay = compute_backoff(policy, attempt);
                #[allow(clippy::cast_possible_truncation)]
                let delay_ms = delay.as_millis() as u64;
                tracing::warn!(
                    target_name = target,
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %err,
                    "Connection failed, will retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                tracing::error!(
                    target_name = target,
                    attempt,
                    max_attempts,
                    error = %err,
                    "Max connection attempts exhausted"
                );
                return Err(PipelineError::Connect {
                    target,
                    attempts: attempt,
                    reason: err.to_string(),
                });
            }
        }
    }
}
