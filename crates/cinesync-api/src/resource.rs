//! The indexed resources served by the read path.

use cinesync_types::config::IndexNames;
use cinesync_types::{FilmDocument, FilmSummary, GenreDocument, PersonDocument};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Per-resource constants of the cache-aside service.
pub trait Resource: Send + Sync + 'static {
    /// Payload of single-item reads.
    type Detail: Serialize + DeserializeOwned + Send + Sync;
    /// Item type of list reads.
    type Summary: Serialize + DeserializeOwned + Send + Sync;

    /// Singular name, used in logs and errors.
    const NAME: &'static str;
    /// Cache key prefix: `{prefix}:{id}` and `{prefix}s:{page}:{size}:...`.
    const CACHE_PREFIX: &'static str;
    /// Field matched by text queries.
    const SEARCH_FIELD: &'static str;
    /// Secondary rank, sorted descending.
    const RANK_FIELD: &'static str;
    /// `(nested path, term field)` of the list filter, if any.
    const FILTER: Option<(&'static str, &'static str)>;

    fn index_name(names: &IndexNames) -> &str;
}

/// Films: full documents by id, rated summaries in lists, filterable by
/// genre id.
#[derive(Debug, Clone, Copy)]
pub struct Films;

impl Resource for Films {
    type Detail = FilmDocument;
    type Summary = FilmSummary;

    const NAME: &'static str = "film";
    const CACHE_PREFIX: &'static str = "film";
    const SEARCH_FIELD: &'static str = "title";
    const RANK_FIELD: &'static str = "imdb_rating";
    const FILTER: Option<(&'static str, &'static str)> = Some(("genres", "genres.id"));

    fn index_name(names: &IndexNames) -> &str {
        &names.films
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Genres;

impl Resource for Genres {
    type Detail = GenreDocument;
    type Summary = GenreDocument;

    const NAME: &'static str = "genre";
    const CACHE_PREFIX: &'static str = "genre";
    const SEARCH_FIELD: &'static str = "name";
    const RANK_FIELD: &'static str = "id";
    const FILTER: Option<(&'static str, &'static str)> = None;

    fn index_name(names: &IndexNames) -> &str {
        &names.genres
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Persons;

impl Resource for Persons {
    type Detail = PersonDocument;
    type Summary = PersonDocument;

    const NAME: &'static str = "person";
    const CACHE_PREFIX: &'static str = "person";
    const SEARCH_FIELD: &'static str = "full_name";
    const RANK_FIELD: &'static str = "id";
    const FILTER: Option<(&'static str, &'static str)> = None;

    fn index_name(names: &IndexNames) -> &str {
        &names.persons
    }
}
