//! Relational source access.
//!
//! [`SourceStore`] is the query surface the extractor needs; the Postgres
//! implementation lives in [`postgres`], an in-memory one in
//! [`crate::memory`].

pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinesync_types::{FilmworkRow, GenreRow, ModifiedRow, PersonRow};
use uuid::Uuid;

pub use postgres::PgSource;

/// Errors produced by source queries.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Query issued after [`SourceStore::close`].
    #[error("source connection is closed")]
    Closed,

    #[error("{0}")]
    Query(String),
}

/// Primary tables tracked by a `modified` timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTable {
    FilmWork,
    Genre,
    Person,
}

impl SourceTable {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FilmWork => "film_work",
            Self::Genre => "genre",
            Self::Person => "person",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only queries against the movies database.
///
/// Every "since" query returns rows with `modified > since` ordered by
/// `modified` ascending; `None` means no lower bound.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Ids and timestamps of rows of `table` changed after `since`.
    async fn modified_since(
        &self,
        table: SourceTable,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ModifiedRow>, SourceError>;

    /// Distinct ids of films tagged with any of `genre_ids`.
    async fn film_ids_by_genres(&self, genre_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError>;

    /// Distinct ids of films crediting any of `person_ids`.
    async fn film_ids_by_persons(&self, person_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError>;

    /// Film × genre × person-role product for `film_ids`.
    async fn films_by_ids(&self, film_ids: &[Uuid]) -> Result<Vec<FilmworkRow>, SourceError>;

    async fn persons_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PersonRow>, SourceError>;

    async fn genres_since(&self, since: Option<DateTime<Utc>>)
        -> Result<Vec<GenreRow>, SourceError>;

    /// Release the connection. Idempotent.
    async fn close(&mut self);
}
