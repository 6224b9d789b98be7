//! Denormalized documents stored in and served from the search index.
//!
//! Documents are plain structs. Construction on the write path goes through
//! `validate`, which either returns the document unchanged or a
//! [`DocumentError`] naming the offending id; nothing unvalidated is handed
//! to the loader. On the read path, `serde` enforces the required fields.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DocumentError;

/// A document that can be upserted into a search index by id.
pub trait IndexDocument: Serialize {
    /// Document kind, used in logs and errors.
    const KIND: &'static str;

    /// Index `_id` of this document.
    fn doc_id(&self) -> Uuid;
}

/// Genre embedded in a film document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreRef {
    pub id: Uuid,
    pub name: String,
}

/// Person embedded in a film document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: Uuid,
    pub name: String,
}

/// Full film document as stored in the films index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmDocument {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub imdb_rating: Option<f64>,
    #[serde(default)]
    pub genres: Vec<GenreRef>,
    #[serde(default)]
    pub directors: Vec<PersonRef>,
    #[serde(default)]
    pub actors_names: Vec<String>,
    #[serde(default)]
    pub writers_names: Vec<String>,
    #[serde(default)]
    pub actors: Vec<PersonRef>,
    #[serde(default)]
    pub writers: Vec<PersonRef>,
}

impl FilmDocument {
    /// Check the document against the films index schema.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the title is blank or an embedded
    /// list repeats an id. Ratings and embedded names are passed through
    /// as the source holds them.
    pub fn validate(self) -> Result<Self, DocumentError> {
        let id = self.id;
        let fail = move |reason: String| DocumentError::new(Self::KIND, id, reason);

        if self.title.trim().is_empty() {
            return Err(fail("title must not be blank".into()));
        }

        check_unique_ids("genres", self.genres.iter().map(|g| g.id)).map_err(fail)?;
        for (list, people) in [
            ("directors", &self.directors),
            ("actors", &self.actors),
            ("writers", &self.writers),
        ] {
            check_unique_ids(list, people.iter().map(|p| p.id)).map_err(fail)?;
        }
        Ok(self)
    }
}

impl IndexDocument for FilmDocument {
    const KIND: &'static str = "film";

    fn doc_id(&self) -> Uuid {
        self.id
    }
}

/// Film projection returned by list reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmSummary {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub imdb_rating: Option<f64>,
}

/// Document of the persons index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDocument {
    pub id: Uuid,
    pub full_name: String,
}

impl PersonDocument {
    /// Validating constructor.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when `full_name` is blank.
    pub fn new(id: Uuid, full_name: impl Into<String>) -> Result<Self, DocumentError> {
        let full_name = full_name.into();
        if full_name.trim().is_empty() {
            return Err(DocumentError::new(Self::KIND, id, "full_name must not be blank"));
        }
        Ok(Self { id, full_name })
    }
}

impl IndexDocument for PersonDocument {
    const KIND: &'static str = "person";

    fn doc_id(&self) -> Uuid {
        self.id
    }
}

/// Document of the genres index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreDocument {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl GenreDocument {
    /// Validating constructor.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when `name` is blank.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self, DocumentError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DocumentError::new(Self::KIND, id, "name must not be blank"));
        }
        Ok(Self {
            id,
            name,
            description,
        })
    }
}

impl IndexDocument for GenreDocument {
    const KIND: &'static str = "genre";

    fn doc_id(&self) -> Uuid {
        self.id
    }
}

fn check_unique_ids(list: &str, ids: impl Iterator<Item = Uuid>) -> Result<(), String> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(format!("{list} contains duplicate id {id}"));
        }
    }
    Ok(())
}
