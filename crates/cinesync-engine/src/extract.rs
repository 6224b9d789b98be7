//! Change-set extraction.
//!
//! Extraction never touches persisted state: it returns the watermark
//! advances it observed and the orchestrator applies them after the load
//! succeeded.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use cinesync_state::watermark::Watermarks;
use cinesync_types::{FilmworkRow, GenreRow, PersonRow, WatermarkKey};
use uuid::Uuid;

use crate::source::{SourceError, SourceStore, SourceTable};

/// Films affected since the last committed watermarks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilmChangeSet {
    /// Distinct ids of every affected film, direct changes first.
    pub film_ids: Vec<Uuid>,
    /// Flat film × genre × person-role rows for `film_ids`.
    pub rows: Vec<FilmworkRow>,
    /// Watermarks to commit once the rows are loaded.
    pub advances: Vec<(WatermarkKey, DateTime<Utc>)>,
}

impl FilmChangeSet {
    /// Number of distinct films in the change set.
    #[must_use]
    pub fn film_count(&self) -> usize {
        self.film_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.film_ids.is_empty() && self.advances.is_empty()
    }
}

/// Rows of a standalone index changed since its watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<T> {
    pub rows: Vec<T>,
    /// `modified` of the last row, `None` when nothing changed.
    pub watermark: Option<DateTime<Utc>>,
}

impl<T> ChangeSet<T> {
    fn new(rows: Vec<T>, modified: impl Fn(&T) -> DateTime<Utc>) -> Self {
        let watermark = rows.last().map(modified);
        Self { rows, watermark }
    }
}

#[derive(Default)]
struct FilmIdSet {
    seen: HashSet<Uuid>,
    ordered: Vec<Uuid>,
}

impl FilmIdSet {
    fn extend(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        for id in ids {
            if self.seen.insert(id) {
                self.ordered.push(id);
            }
        }
    }
}

/// Compute the films to re-index: direct film changes plus every film
/// linked to a changed genre or person.
///
/// Each watermark advances to the `modified` of the last row returned for
/// its own table; an empty fetch leaves it unchanged and triggers no
/// fan-out.
///
/// # Errors
///
/// Propagates source query failures.
pub async fn extract_film_changes(
    source: &dyn SourceStore,
    watermarks: &Watermarks,
) -> Result<FilmChangeSet, SourceError> {
    let mut ids = FilmIdSet::default();
    let mut advances = Vec::new();

    let films = source
        .modified_since(SourceTable::FilmWork, watermarks.get(WatermarkKey::Filmwork))
        .await?;
    if let Some(last) = films.last() {
        advances.push((WatermarkKey::Filmwork, last.modified));
        ids.extend(films.iter().map(|r| r.id));
    }

    let genres = source
        .modified_since(SourceTable::Genre, watermarks.get(WatermarkKey::Genre))
        .await?;
    if let Some(last) = genres.last() {
        advances.push((WatermarkKey::Genre, last.modified));
        let changed: Vec<Uuid> = genres.iter().map(|r| r.id).collect();
        ids.extend(source.film_ids_by_genres(&changed).await?);
    }

    let persons = source
        .modified_since(SourceTable::Person, watermarks.get(WatermarkKey::Person))
        .await?;
    if let Some(last) = persons.last() {
        advances.push((WatermarkKey::Person, last.modified));
        let changed: Vec<Uuid> = persons.iter().map(|r| r.id).collect();
        ids.extend(source.film_ids_by_persons(&changed).await?);
    }

    let rows = if ids.ordered.is_empty() {
        Vec::new()
    } else {
        source.films_by_ids(&ids.ordered).await?
    };

    tracing::info!(
        films = films.len(),
        genres = genres.len(),
        persons = persons.len(),
        affected = ids.ordered.len(),
        rows = rows.len(),
        "Extracted film changes"
    );

    Ok(FilmChangeSet {
        film_ids: ids.ordered,
        rows,
        advances,
    })
}

/// Persons changed since the `person_index` watermark.
///
/// # Errors
///
/// Propagates source query failures.
pub async fn extract_person_changes(
    source: &dyn SourceStore,
    watermarks: &Watermarks,
) -> Result<ChangeSet<PersonRow>, SourceError> {
    let rows = source
        .persons_since(watermarks.get(WatermarkKey::PersonIndex))
        .await?;
    tracing::info!(entity = "person", count = rows.len(), "Extracted changes");
    Ok(ChangeSet::new(rows, |r| r.modified))
}

/// Genres changed since the `genre_index` watermark.
///
/// # Errors
///
/// Propagates source query failures.
pub async fn extract_genre_changes(
    source: &dyn SourceStore,
    watermarks: &Watermarks,
) -> Result<ChangeSet<GenreRow>, SourceError> {
    let rows = source
        .genres_since(watermarks.get(WatermarkKey::GenreIndex))
        .await?;
    tracing::info!(entity = "genre", count = rows.len(), "Extracted changes");
    Ok(ChangeSet::new(rows, |r| r.modified))
}
