//! ETL state persistence for cinesync.
//!
//! Provides the [`StateBackend`] trait with a crash-safe
//! [`JsonFileStateBackend`] and a [`SqliteStateBackend`], plus typed
//! helpers for watermarks and the process status.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod json_file;
pub mod sqlite;
pub mod watermark;

pub use backend::StateBackend;
pub use error::StateError;
pub use json_file::JsonFileStateBackend;
pub use sqlite::SqliteStateBackend;
