//! Rows read from the relational source.
//!
//! These mirror the result shapes of the extractor queries and carry no
//! database driver types, so the in-memory source and the Postgres source
//! produce the same values.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity plus change-detection timestamp of a primary entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedRow {
    pub id: Uuid,
    pub modified: DateTime<Utc>,
}

/// Role a person plays in a film.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRole {
    Director,
    Actor,
    Writer,
}

impl PersonRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Actor => "actor",
            Self::Writer => "writer",
        }
    }
}

impl fmt::Display for PersonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "director" => Ok(Self::Director),
            "actor" => Ok(Self::Actor),
            "writer" => Ok(Self::Writer),
            other => Err(format!("unknown person role '{other}'")),
        }
    }
}

/// One row of the film × genre × person-role product.
///
/// Genre and person columns come from outer joins and are absent for
/// films without genres or crew. `role` stays a raw string so that roles
/// unknown to this service are carried to the transformer, which skips
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmworkRow {
    pub fw_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub modified: DateTime<Utc>,
    pub genre_id: Option<Uuid>,
    pub genre: Option<String>,
    pub person_id: Option<Uuid>,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

/// A person row for the persons index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRow {
    pub id: Uuid,
    pub full_name: String,
    pub modified: DateTime<Utc>,
}

/// A genre row for the genres index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub modified: DateTime<Utc>,
}
