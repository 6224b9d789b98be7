//! JSON-file-backed implementation of [`StateBackend`].
//!
//! The whole state is one flat JSON object. Every `set_state` rewrites the
//! file through a temp file in the same directory followed by a rename, so
//! readers and restarts only ever observe a complete previous or a complete
//! new document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::backend::StateBackend;
use crate::error::{self, StateError};

/// File-backed state storage.
pub struct JsonFileStateBackend {
    path: PathBuf,
    state: Mutex<Map<String, Value>>,
}

impl JsonFileStateBackend {
    /// Open the state file at `path`, creating parent directories.
    ///
    /// A missing or empty file is an empty state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the file can't be read or the
    /// directory can't be created, or [`StateError::Corrupt`] if the file
    /// is not a JSON object.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = non_empty_parent(path) {
            fs::create_dir_all(parent)?;
        }

        let state = match fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => Map::new(),
            Ok(raw) => serde_json::from_str::<Map<String, Value>>(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(StateError::Io(e)),
        };

        tracing::debug!(path = %path.display(), keys = state.len(), "Loaded ETL state file");
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_state(&self) -> error::Result<MutexGuard<'_, Map<String, Value>>> {
        self.state.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Write `state` to a sibling temp file, fsync it and rename it over
    /// the target.
    fn write_atomically(&self, state: &Map<String, Value>) -> error::Result<()> {
        let dir = non_empty_parent(&self.path).unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), state)?;
        tmp.as_file_mut().write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StateError::Io(e.error))?;

        // The rename itself is only durable once the directory entry is.
        #[cfg(unix)]
        fs::File::open(dir)?.sync_all()?;

        Ok(())
    }
}

impl StateBackend for JsonFileStateBackend {
    fn get_state(&self, key: &str) -> error::Result<Option<Value>> {
        let state = self.lock_state()?;
        Ok(state.get(key).cloned())
    }

    fn set_state(&self, key: &str, value: Value) -> error::Result<()> {
        let mut state = self.lock_state()?;
        let mut next = state.clone();
        next.insert(key.to_string(), value);
        self.write_atomically(&next)?;
        *state = next;
        Ok(())
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}
