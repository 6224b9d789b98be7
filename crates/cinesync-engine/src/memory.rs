//! In-memory movies database and connector for tests, compiled only with
//! the `test-util` feature.
//!
//! Mirrors the Postgres queries closely enough that the extractor cannot
//! tell the two apart: `modified` ordering, outer-join products and
//! closed-connection errors.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinesync_index::DocumentSink;
use cinesync_types::{FilmworkRow, GenreRow, ModifiedRow, PersonRow};
use uuid::Uuid;

use crate::connector::Connector;
use crate::errors::PipelineError;
use crate::source::{SourceError, SourceStore, SourceTable};

/// A `film_work` row.
#[derive(Debug, Clone, PartialEq)]
pub struct FilmRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    films: Vec<FilmRecord>,
    genres: Vec<GenreRow>,
    persons: Vec<PersonRow>,
    genre_links: Vec<(Uuid, Uuid)>,
    person_links: Vec<(Uuid, Uuid, String)>,
}

/// Shared in-memory tables; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: Arc<Mutex<Tables>>,
    closes: Arc<AtomicUsize>,
    queries: Arc<AtomicUsize>,
    closed: bool,
}

fn upsert_by<T>(rows: &mut Vec<T>, row: T, same: impl Fn(&T) -> bool) {
    match rows.iter_mut().find(|r| same(r)) {
        Some(existing) => *existing = row,
        None => rows.push(row),
    }
}

fn after(modified: DateTime<Utc>, since: Option<DateTime<Utc>>) -> bool {
    since.map_or(true, |ts| modified > ts)
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, SourceError> {
        if self.closed {
            return Err(SourceError::Closed);
        }
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.tables
            .lock()
            .map_err(|_| SourceError::Query("memory source lock poisoned".into()))
    }

    fn edit(&self, f: impl FnOnce(&mut Tables)) {
        if let Ok(mut tables) = self.tables.lock() {
            f(&mut tables);
        }
    }

    /// Handle sharing the tables but with its own open/closed state.
    #[must_use]
    pub fn reopen(&self) -> Self {
        Self {
            closed: false,
            ..self.clone()
        }
    }

    pub fn upsert_film(&self, film: FilmRecord) {
        self.edit(|t| {
            let id = film.id;
            upsert_by(&mut t.films, film, |f| f.id == id);
        });
    }

    pub fn upsert_genre(&self, genre: GenreRow) {
        self.edit(|t| {
            let id = genre.id;
            upsert_by(&mut t.genres, genre, |g| g.id == id);
        });
    }

    pub fn upsert_person(&self, person: PersonRow) {
        self.edit(|t| {
            let id = person.id;
            upsert_by(&mut t.persons, person, |p| p.id == id);
        });
    }

    pub fn link_genre(&self, film_id: Uuid, genre_id: Uuid) {
        self.edit(|t| t.genre_links.push((film_id, genre_id)));
    }

    pub fn link_person(&self, film_id: Uuid, person_id: Uuid, role: &str) {
        self.edit(|t| t.person_links.push((film_id, person_id, role.to_string())));
    }

    /// Number of handles closed so far.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Number of queries served so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl Tables {
    fn modified_of(&self, film_id: Uuid) -> Option<DateTime<Utc>> {
        self.films.iter().find(|f| f.id == film_id).map(|f| f.modified)
    }

    /// Distinct linked film ids ordered by film `modified`.
    fn linked_films(&self, linked: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        let mut films: Vec<(DateTime<Utc>, Uuid)> = linked
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.modified_of(id).map(|m| (m, id)))
            .collect();
        films.sort();
        films.into_iter().map(|(_, id)| id).collect()
    }
}

#[async_trait]
impl SourceStore for MemorySource {
    async fn modified_since(
        &self,
        table: SourceTable,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ModifiedRow>, SourceError> {
        let tables = self.tables()?;
        let mut rows: Vec<ModifiedRow> = match table {
            SourceTable::FilmWork => tables
                .films
                .iter()
                .map(|f| ModifiedRow {
                    id: f.id,
                    modified: f.modified,
                })
                .collect(),
            SourceTable::Genre => tables
                .genres
                .iter()
                .map(|g| ModifiedRow {
                    id: g.id,
                    modified: g.modified,
                })
                .collect(),
            SourceTable::Person => tables
                .persons
                .iter()
                .map(|p| ModifiedRow {
                    id: p.id,
                    modified: p.modified,
                })
                .collect(),
        };
        rows.retain(|r| after(r.modified, since));
        rows.sort_by_key(|r| r.modified);
        Ok(rows)
    }

    async fn film_ids_by_genres(&self, genre_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError> {
        let tables = self.tables()?;
        let linked = tables
            .genre_links
            .iter()
            .filter(|(_, g)| genre_ids.contains(g))
            .map(|(f, _)| *f);
        Ok(tables.linked_films(linked))
    }

    async fn film_ids_by_persons(&self, person_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError> {
        let tables = self.tables()?;
        let linked = tables
            .person_links
            .iter()
            .filter(|(_, p, _)| person_ids.contains(p))
            .map(|(f, _, _)| *f);
        Ok(tables.linked_films(linked))
    }

    async fn films_by_ids(&self, film_ids: &[Uuid]) -> Result<Vec<FilmworkRow>, SourceError> {
        let tables = self.tables()?;
        let mut films: Vec<&FilmRecord> = tables
            .films
            .iter()
            .filter(|f| film_ids.contains(&f.id))
            .collect();
        films.sort_by_key(|f| (f.modified, f.id));

        let mut rows = Vec::new();
        for film in films {
            let mut genres: Vec<Option<&GenreRow>> = tables
                .genre_links
                .iter()
                .filter(|(f, _)| *f == film.id)
                .map(|(_, g)| tables.genres.iter().find(|row| row.id == *g))
                .collect();
            if genres.is_empty() {
                genres.push(None);
            }
            let mut persons: Vec<Option<(&PersonRow, &str)>> = tables
                .person_links
                .iter()
                .filter(|(f, _, _)| *f == film.id)
                .map(|(_, p, role)| {
                    tables
                        .persons
                        .iter()
                        .find(|row| row.id == *p)
                        .map(|row| (row, role.as_str()))
                })
                .collect();
            if persons.is_empty() {
                persons.push(None);
            }

            for genre in &genres {
                for person in &persons {
                    rows.push(FilmworkRow {
                        fw_id: film.id,
                        title: film.title.clone(),
                        description: film.description.clone(),
                        rating: film.rating,
                        modified: film.modified,
                        genre_id: genre.map(|g| g.id),
                        genre: genre.map(|g| g.name.clone()),
                        person_id: person.map(|(p, _)| p.id),
                        full_name: person.map(|(p, _)| p.full_name.clone()),
                        role: person.map(|(_, role)| role.to_string()),
                    });
                }
            }
        }
        Ok(rows)
    }

    async fn persons_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PersonRow>, SourceError> {
        let tables = self.tables()?;
        let mut rows: Vec<PersonRow> = tables
            .persons
            .iter()
            .filter(|p| after(p.modified, since))
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.modified);
        Ok(rows)
    }

    async fn genres_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<GenreRow>, SourceError> {
        let tables = self.tables()?;
        let mut rows: Vec<GenreRow> = tables
            .genres
            .iter()
            .filter(|g| after(g.modified, since))
            .cloned()
            .collect();
        rows.sort_by_key(|g| g.modified);
        Ok(rows)
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Connector over a [`MemorySource`] and any sink, with failure injection.
#[derive(Clone)]
pub struct MemoryConnector {
    source: MemorySource,
    sink: Arc<dyn DocumentSink>,
    source_down: bool,
    sink_down: bool,
}

impl MemoryConnector {
    #[must_use]
    pub fn new(source: MemorySource, sink: Arc<dyn DocumentSink>) -> Self {
        Self {
            source,
            sink,
            source_down: false,
            sink_down: false,
        }
    }

    /// Make every source connection attempt fail.
    #[must_use]
    pub fn with_source_down(mut self) -> Self {
        self.source_down = true;
        self
    }

    /// Make every sink connection attempt fail.
    #[must_use]
    pub fn with_sink_down(mut self) -> Self {
        self.sink_down = true;
        self
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect_source(&self) -> Result<Box<dyn SourceStore>, PipelineError> {
        if self.source_down {
            return Err(PipelineError::Connect {
                target: "postgres",
                attempts: 1,
                reason: "source unavailable".into(),
            });
        }
        Ok(Box::new(self.source.reopen()))
    }

    async fn connect_sink(&self) -> Result<Arc<dyn DocumentSink>, PipelineError> {
        if self.sink_down {
            return Err(PipelineError::Connect {
                target: "elasticsearch",
                attempts: 1,
                reason: "index unavailable".into(),
            });
        }
        Ok(Arc::clone(&self.sink))
    }
}
