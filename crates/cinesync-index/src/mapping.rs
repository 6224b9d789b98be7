//! Fixed index settings and mappings.
//!
//! The films, genres and persons indices share one bilingual analyzer;
//! mappings are strict so documents with unexpected fields are rejected.

use cinesync_types::config::IndexNames;
use serde_json::{json, Value};

const ANALYZER: &str = "ru_en";

fn settings() -> Value {
    json!({
        "refresh_interval": "1s",
        "analysis": {
            "filter": {
                "english_stop": { "type": "stop", "stopwords": "_english_" },
                "english_stemmer": { "type": "stemmer", "language": "english" },
                "english_possessive_stemmer": {
                    "type": "stemmer",
                    "language": "possessive_english"
                },
                "russian_stop": { "type": "stop", "stopwords": "_russian_" },
                "russian_stemmer": { "type": "stemmer", "language": "russian" }
            },
            "analyzer": {
                ANALYZER: {
                    "tokenizer": "standard",
                    "filter": [
                        "lowercase",
                        "english_stop",
                        "english_stemmer",
                        "english_possessive_stemmer",
                        "russian_stop",
                        "russian_stemmer"
                    ]
                }
            }
        }
    })
}

fn text() -> Value {
    json!({ "type": "text", "analyzer": ANALYZER })
}

fn keyword() -> Value {
    json!({ "type": "keyword" })
}

fn nested_ref() -> Value {
    json!({
        "type": "nested",
        "dynamic": "strict",
        "properties": { "id": keyword(), "name": text() }
    })
}

/// Films index: full documents with nested genres and crew.
#[must_use]
pub fn films_index() -> Value {
    json!({
        "settings": settings(),
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "id": keyword(),
                "imdb_rating": { "type": "float" },
                "title": {
                    "type": "text",
                    "analyzer": ANALYZER,
                    "fields": { "raw": keyword() }
                },
                "description": text(),
                "genres": nested_ref(),
                "directors": nested_ref(),
                "actors_names": text(),
                "writers_names": text(),
                "actors": nested_ref(),
                "writers": nested_ref()
            }
        }
    })
}

#[must_use]
pub fn genres_index() -> Value {
    json!({
        "settings": settings(),
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "id": keyword(),
                "name": text(),
                "description": text()
            }
        }
    })
}

#[must_use]
pub fn persons_index() -> Value {
    json!({
        "settings": settings(),
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "id": keyword(),
                "full_name": text()
            }
        }
    })
}

/// `(index name, definition)` for every index the pipeline writes.
#[must_use]
pub fn index_definitions(names: &IndexNames) -> Vec<(String, Value)> {
    vec![
        (names.films.clone(), films_index()),
        (names.genres.clone(), genres_index()),
        (names.persons.clone(), persons_index()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn films_mapping_nests_embedded_lists() {
        let def = films_index();
        let props = &def["mappings"]["properties"];
        for field in ["genres", "directors", "actors", "writers"] {
            assert_eq!(props[field]["type"], "nested", "{field}");
        }
        assert_eq!(def["settings"]["analysis"]["analyzer"][ANALYZER]["tokenizer"], "standard");
    }

    #[test]
    fn definitions_follow_configured_names() {
        let defs = index_definitions(&IndexNames::default());
        let names: Vec<&str> = defs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["movies", "genres", "persons"]);
    }
}
