pub mod check;
pub mod indices;
pub mod read;
pub mod run;

use std::sync::Arc;

use anyhow::{Context, Result};
use cinesync_state::{JsonFileStateBackend, SqliteStateBackend, StateBackend};
use cinesync_types::config::{StateBackendKind, StateConfig};

/// Open the configured watermark store.
pub(crate) fn open_state(config: &StateConfig) -> Result<Arc<dyn StateBackend>> {
    let path = &config.path;
    let backend: Arc<dyn StateBackend> = match config.backend {
        StateBackendKind::JsonFile => Arc::new(
            JsonFileStateBackend::open(path)
                .with_context(|| format!("Failed to open state file: {}", path.display()))?,
        ),
        StateBackendKind::Sqlite => Arc::new(
            SqliteStateBackend::open(path)
                .with_context(|| format!("Failed to open state database: {}", path.display()))?,
        ),
    };
    Ok(backend)
}
