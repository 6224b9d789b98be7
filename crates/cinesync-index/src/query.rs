//! Typed subset of the index query DSL.
//!
//! Only the shapes the query services need are modelled; [`SearchRequest::to_json`]
//! renders them as an Elasticsearch `_search` body and [`crate::MemoryIndex`]
//! evaluates them directly.

use serde_json::{json, Value};

/// Query clause of a search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Every document, score 1.
    MatchAll,
    /// Full-text match of `text` against `field`.
    Match { field: String, text: String },
    /// Exact `value` on `field` of any element of the nested list at `path`.
    NestedTerm {
        path: String,
        field: String,
        value: String,
    },
}

impl SearchQuery {
    fn to_json(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::Match { field, text } => json!({ "match": { field: { "query": text } } }),
            Self::NestedTerm { path, field, value } => json!({
                "nested": {
                    "path": path,
                    "query": { "bool": { "filter": [ { "term": { field: value } } ] } }
                }
            }),
        }
    }
}

/// Sort criterion. All sorts are descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Relevance score.
    Score,
    /// A document field.
    Field(String),
}

impl SortKey {
    fn to_json(&self) -> Value {
        match self {
            Self::Score => json!({ "_score": { "order": "desc" } }),
            Self::Field(name) => json!({ name: { "order": "desc", "missing": "_last" } }),
        }
    }
}

/// A paginated, sorted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: SearchQuery,
    pub sort: Vec<SortKey>,
    pub from: usize,
    pub size: usize,
}

impl SearchRequest {
    /// Render as an Elasticsearch `_search` body.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "query": self.query.to_json(),
            "sort": self.sort.iter().map(SortKey::to_json).collect::<Vec<_>>(),
            "from": self.from,
            "size": self.size,
            "track_total_hits": true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_request_renders_score_then_rank() {
        let request = SearchRequest {
            query: SearchQuery::Match {
                field: "title".into(),
                text: "star".into(),
            },
            sort: vec![SortKey::Score, SortKey::Field("imdb_rating".into())],
            from: 20,
            size: 10,
        };
        let body = request.to_json();
        assert_eq!(body["query"]["match"]["title"]["query"], "star");
        assert_eq!(body["sort"][0]["_score"]["order"], "desc");
        assert_eq!(body["sort"][1]["imdb_rating"]["order"], "desc");
        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], 10);
    }

    #[test]
    fn nested_term_renders_filter() {
        let request = SearchRequest {
            query: SearchQuery::NestedTerm {
                path: "genres".into(),
                field: "genres.id".into(),
                value: "abc".into(),
            },
            sort: vec![SortKey::Field("imdb_rating".into())],
            from: 0,
            size: 50,
        };
        let body = request.to_json();
        assert_eq!(body["query"]["nested"]["path"], "genres");
        assert_eq!(
            body["query"]["nested"]["query"]["bool"]["filter"][0]["term"]["genres.id"],
            "abc"
        );
    }

    #[test]
    fn match_all_renders_empty_object() {
        let request = SearchRequest {
            query: SearchQuery::MatchAll,
            sort: vec![],
            from: 0,
            size: 1,
        };
        assert_eq!(request.to_json()["query"], json!({ "match_all": {} }));
    }
}
