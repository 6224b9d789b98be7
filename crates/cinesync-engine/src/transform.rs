//! Denormalization of source rows into index documents.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use cinesync_types::document::{GenreRef, PersonRef};
use cinesync_types::{
    DocumentError, FilmDocument, FilmworkRow, GenreDocument, GenreRow, PersonDocument, PersonRole,
    PersonRow,
};
use uuid::Uuid;

/// Film document under construction, with per-list id sets for dedup.
struct FilmAggregate {
    doc: FilmDocument,
    genre_ids: HashSet<Uuid>,
    role_ids: HashMap<PersonRole, HashSet<Uuid>>,
    actor_names: HashSet<String>,
    writer_names: HashSet<String>,
}

impl FilmAggregate {
    fn new(row: &FilmworkRow) -> Self {
        Self {
            doc: FilmDocument {
                id: row.fw_id,
                title: row.title.clone(),
                description: row.description.clone(),
                imdb_rating: row.rating,
                genres: Vec::new(),
                directors: Vec::new(),
                actors_names: Vec::new(),
                writers_names: Vec::new(),
                actors: Vec::new(),
                writers: Vec::new(),
            },
            genre_ids: HashSet::new(),
            role_ids: HashMap::new(),
            actor_names: HashSet::new(),
            writer_names: HashSet::new(),
        }
    }

    fn absorb(&mut self, row: FilmworkRow) {
        if let (Some(id), Some(name)) = (row.genre_id, row.genre) {
            if self.genre_ids.insert(id) {
                self.doc.genres.push(GenreRef { id, name });
            }
        }

        let (Some(id), Some(name), Some(role)) = (row.person_id, row.full_name, row.role) else {
            return;
        };
        let role = match PersonRole::from_str(&role) {
            Ok(role) => role,
            Err(_) => {
                tracing::debug!(film = %self.doc.id, person = %id, role = %role, "Skipping unknown role");
                return;
            }
        };
        if !self.role_ids.entry(role).or_default().insert(id) {
            return;
        }
        let person = PersonRef {
            id,
            name: name.clone(),
        };
        match role {
            PersonRole::Director => self.doc.directors.push(person),
            PersonRole::Actor => {
                self.doc.actors.push(person);
                if self.actor_names.insert(name.clone()) {
                    self.doc.actors_names.push(name);
                }
            }
            PersonRole::Writer => {
                self.doc.writers.push(person);
                if self.writer_names.insert(name.clone()) {
                    self.doc.writers_names.push(name);
                }
            }
        }
    }
}

/// Lazy stream of validated film documents, one per distinct film id in
/// first-seen order.
pub struct FilmDocuments {
    aggregates: std::vec::IntoIter<FilmAggregate>,
}

impl Iterator for FilmDocuments {
    type Item = Result<FilmDocument, DocumentError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.aggregates.next().map(|agg| agg.doc.validate())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.aggregates.size_hint()
    }
}

impl ExactSizeIterator for FilmDocuments {}

/// Group flat film rows by film id.
///
/// Scalar fields come from the first row of each film; genres and each
/// role list are deduplicated by id, the plain actor and writer name lists
/// by name.
#[must_use]
pub fn transform_films(rows: Vec<FilmworkRow>) -> FilmDocuments {
    let mut positions: HashMap<Uuid, usize> = HashMap::new();
    let mut aggregates: Vec<FilmAggregate> = Vec::new();
    for row in rows {
        let pos = *positions.entry(row.fw_id).or_insert_with(|| {
            aggregates.push(FilmAggregate::new(&row));
            aggregates.len() - 1
        });
        aggregates[pos].absorb(row);
    }
    FilmDocuments {
        aggregates: aggregates.into_iter(),
    }
}

/// Project person rows 1:1 into person documents.
pub fn transform_persons(
    rows: Vec<PersonRow>,
) -> impl Iterator<Item = Result<PersonDocument, DocumentError>> {
    rows.into_iter()
        .map(|row| PersonDocument::new(row.id, row.full_name))
}

/// Project genre rows 1:1 into genre documents.
pub fn transform_genres(
    rows: Vec<GenreRow>,
) -> impl Iterator<Item = Result<GenreDocument, DocumentError>> {
    rows.into_iter()
        .map(|row| GenreDocument::new(row.id, row.name, row.description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn row(film: u128, genre: Option<u128>, person: Option<(u128, &str, &str)>) -> FilmworkRow {
        FilmworkRow {
            fw_id: id(film),
            title: format!("Film {film}"),
            description: Some("About".into()),
            rating: Some(8.1),
            modified: Utc.timestamp_opt(1_000, 0).unwrap(),
            genre_id: genre.map(id),
            genre: genre.map(|g| format!("Genre {g}")),
            person_id: person.map(|(p, _, _)| id(p)),
            full_name: person.map(|(_, name, _)| name.to_string()),
            role: person.map(|(_, _, role)| role.to_string()),
        }
    }

    #[test]
    fn test_product_rows_collapse_to_one_document() {
        let mut rows = Vec::new();
        for genre in [10, 11] {
            for person in [(20, "Dee", "director"), (21, "Al", "actor"), (22, "Wu", "writer")] {
                rows.push(row(1, Some(genre), Some(person)));
            }
        }
        let docs: Vec<FilmDocument> = transform_films(rows).map(Result::unwrap).collect();
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.genres.len(), 2);
        assert_eq!(doc.directors.len(), 1);
        assert_eq!(doc.actors.len(), 1);
        assert_eq!(doc.writers.len(), 1);
        assert_eq!(doc.actors_names, vec!["Al".to_string()]);
        assert_eq!(doc.writers_names, vec!["Wu".to_string()]);
        assert_eq!(doc.imdb_rating, Some(8.1));
    }

    #[test]
    fn test_first_seen_order_across_films() {
        let rows = vec![
            row(2, Some(11), None),
            row(1, Some(10), None),
            row(2, Some(10), None),
        ];
        let docs: Vec<FilmDocument> = transform_films(rows).map(Result::unwrap).collect();
        let ids: Vec<Uuid> = docs.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![id(2), id(1)]);
        let genres: Vec<Uuid> = docs[0].genres.iter().map(|g| g.id).collect();
        assert_eq!(genres, vec![id(11), id(10)]);
    }

    #[test]
    fn test_same_person_in_two_roles_lands_in_both_lists() {
        let rows = vec![
            row(1, None, Some((20, "Sam", "director"))),
            row(1, None, Some((20, "Sam", "writer"))),
        ];
        let doc = transform_films(rows).next().unwrap().unwrap();
        assert_eq!(doc.directors.len(), 1);
        assert_eq!(doc.writers.len(), 1);
        assert!(doc.actors.is_empty());
    }

    #[test]
    fn test_namesakes_share_one_plain_name() {
        let rows = vec![
            row(1, None, Some((20, "Chris Evans", "actor"))),
            row(1, None, Some((21, "Chris Evans", "actor"))),
        ];
        let doc = transform_films(rows).next().unwrap().unwrap();
        assert_eq!(doc.actors.len(), 2);
        assert_eq!(doc.actors_names, vec!["Chris Evans".to_string()]);
    }

    #[test]
    fn test_unknown_role_is_ignored() {
        let rows = vec![row(1, None, Some((20, "Pat", "producer")))];
        let doc = transform_films(rows).next().unwrap().unwrap();
        assert!(doc.directors.is_empty() && doc.actors.is_empty() && doc.writers.is_empty());
    }

    #[test]
    fn test_film_without_relations() {
        let doc = transform_films(vec![row(1, None, None)])
            .next()
            .unwrap()
            .unwrap();
        assert!(doc.genres.is_empty());
        assert_eq!(doc.title, "Film 1");
    }

    #[test]
    fn test_invalid_film_surfaces_error_with_id() {
        let mut bad = row(7, None, None);
        bad.title = "  ".into();
        let err = transform_films(vec![bad]).next().unwrap().unwrap_err();
        assert_eq!(err.id, id(7));
        assert_eq!(err.entity, "film");
    }

    #[test]
    fn test_person_and_genre_projections() {
        let modified = Utc.timestamp_opt(5, 0).unwrap();
        let persons = transform_persons(vec![PersonRow {
            id: id(1),
            full_name: "Ann Lee".into(),
            modified,
        }])
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
        assert_eq!(persons[0].full_name, "Ann Lee");

        let genres: Vec<_> = transform_genres(vec![GenreRow {
            id: id(2),
            name: String::new(),
            description: None,
            modified,
        }])
        .collect();
        assert!(genres[0].is_err());
    }
}
