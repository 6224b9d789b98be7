//! Shared model types for cinesync.
//!
//! Pure data types used by the write path (`cinesync-engine`), the read
//! path (`cinesync-api`) and the storage seams (`cinesync-state`,
//! `cinesync-index`). Kept in one crate so those crates can share them
//! without depending on each other.

#![warn(clippy::pedantic)]

pub mod config;
pub mod document;
pub mod error;
pub mod row;
pub mod state;

pub use document::{
    FilmDocument, FilmSummary, GenreDocument, GenreRef, IndexDocument, PersonDocument, PersonRef,
};
pub use error::DocumentError;
pub use row::{FilmworkRow, GenreRow, ModifiedRow, PersonRole, PersonRow};
pub use state::{EtlStatus, WatermarkKey};
