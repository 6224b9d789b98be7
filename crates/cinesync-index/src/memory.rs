//! In-memory index for tests and local runs.
//!
//! Evaluates the typed [`SearchQuery`] subset with a simple token-overlap
//! score and counts calls so tests can assert on traffic.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{BulkItem, BulkSummary, DocumentSink, SearchHits, SearchIndex};
use crate::error::IndexError;
use crate::query::{SearchQuery, SearchRequest, SortKey};

type Documents = BTreeMap<String, Value>;

/// Shared in-memory index store.
#[derive(Default)]
pub struct MemoryIndex {
    indices: Mutex<HashMap<String, Documents>>,
    bulk_batches: Mutex<Vec<Vec<String>>>,
    fail_bulk_from_call: Mutex<Option<usize>>,
    get_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every bulk call numbered `call` (0-based) and later fail.
    pub fn fail_bulk_from(&self, call: usize) {
        if let Ok(mut guard) = self.fail_bulk_from_call.lock() {
            *guard = Some(call);
        }
    }

    /// Ids of each accepted bulk call, in call order.
    #[must_use]
    pub fn bulk_batches(&self) -> Vec<Vec<String>> {
        self.bulk_batches
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(AtomicOrdering::SeqCst)
    }

    #[must_use]
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(AtomicOrdering::SeqCst)
    }

    /// Stored document, bypassing call counters.
    #[must_use]
    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.indices
            .lock()
            .ok()
            .and_then(|indices| indices.get(index).and_then(|docs| docs.get(id).cloned()))
    }

    /// Number of documents stored in `index`.
    #[must_use]
    pub fn len(&self, index: &str) -> usize {
        self.indices
            .lock()
            .map(|indices| indices.get(index).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Insert a document directly, bypassing bulk accounting.
    pub fn insert(&self, index: &str, id: impl Into<String>, source: Value) {
        if let Ok(mut indices) = self.indices.lock() {
            indices
                .entry(index.to_string())
                .or_default()
                .insert(id.into(), source);
        }
    }

    fn poisoned() -> IndexError {
        IndexError::Decode("memory index lock poisoned".into())
    }
}

#[async_trait]
impl DocumentSink for MemoryIndex {
    async fn bulk_upsert(
        &self,
        index: &str,
        items: &[BulkItem],
    ) -> Result<BulkSummary, IndexError> {
        let mut batches = self.bulk_batches.lock().map_err(|_| Self::poisoned())?;
        let call = batches.len();
        let fail_from = *self.fail_bulk_from_call.lock().map_err(|_| Self::poisoned())?;
        if fail_from.is_some_and(|from| call >= from) {
            return Err(IndexError::Status {
                status: 503,
                body: format!("injected failure on bulk call {call}"),
            });
        }

        let mut indices = self.indices.lock().map_err(|_| Self::poisoned())?;
        let docs = indices.entry(index.to_string()).or_default();
        for item in items {
            docs.insert(item.id.clone(), item.source.clone());
        }
        batches.push(items.iter().map(|i| i.id.clone()).collect());
        Ok(BulkSummary {
            indexed: items.len(),
        })
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, IndexError> {
        self.get_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let indices = self.indices.lock().map_err(|_| Self::poisoned())?;
        Ok(indices.get(index).and_then(|docs| docs.get(id).cloned()))
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchHits, IndexError> {
        self.search_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let indices = self.indices.lock().map_err(|_| Self::poisoned())?;
        let Some(docs) = indices.get(index) else {
            return Ok(SearchHits::default());
        };

        let mut scored: Vec<(f64, &Value)> = docs
            .values()
            .filter_map(|doc| score(&request.query, doc).map(|s| (s, doc)))
            .collect();
        scored.sort_by(|a, b| compare(&request.sort, a, b));

        let total = scored.len() as u64;
        let hits = scored
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .map(|(_, doc)| doc.clone())
            .collect();
        Ok(SearchHits { total, hits })
    }
}

/// Score of `doc` for `query`, `None` if it does not match.
#[allow(clippy::cast_precision_loss)]
fn score(query: &SearchQuery, doc: &Value) -> Option<f64> {
    match query {
        SearchQuery::MatchAll => Some(1.0),
        SearchQuery::Match { field, text } => {
            let haystack = tokens(lookup(doc, field)?.as_str()?);
            let hits = tokens(text)
                .iter()
                .filter(|t| haystack.contains(t))
                .count();
            (hits > 0).then_some(hits as f64)
        }
        SearchQuery::NestedTerm { path, field, value } => {
            let inner = field
                .strip_prefix(path.as_str())
                .and_then(|f| f.strip_prefix('.'))
                .unwrap_or(field);
            let matched = lookup(doc, path)?
                .as_array()?
                .iter()
                .any(|element| lookup(element, inner).is_some_and(|v| term_eq(v, value)));
            matched.then_some(1.0)
        }
    }
}

fn compare(sort: &[SortKey], a: &(f64, &Value), b: &(f64, &Value)) -> Ordering {
    for key in sort {
        let ordering = match key {
            SortKey::Score => b.0.total_cmp(&a.0),
            SortKey::Field(field) => compare_desc(lookup(a.1, field), lookup(b.1, field)),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Descending order with missing values last.
fn compare_desc(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.filter(|v| !v.is_null()), b.filter(|v| !v.is_null())) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            _ => y.to_string().cmp(&x.to_string()),
        },
    }
}

fn lookup<'a>(doc: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(doc, |node, part| node.get(part))
}

fn term_eq(v: &Value, expected: &str) -> bool {
    match v {
        Value::String(s) => s == expected,
        other => other.to_string() == expected,
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> MemoryIndex {
        let index = MemoryIndex::new();
        index.insert(
            "movies",
            "1",
            json!({"id": "1", "title": "Star Wars", "imdb_rating": 8.6,
                   "genres": [{"id": "g1", "name": "Sci-Fi"}]}),
        );
        index.insert(
            "movies",
            "2",
            json!({"id": "2", "title": "Star Trek Star", "imdb_rating": 7.9,
                   "genres": [{"id": "g2", "name": "Adventure"}]}),
        );
        index.insert(
            "movies",
            "3",
            json!({"id": "3", "title": "Solaris", "imdb_rating": null, "genres": []}),
        );
        index
    }

    fn ids(hits: &SearchHits) -> Vec<&str> {
        hits.hits.iter().map(|h| h["id"].as_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn match_ranks_by_score_then_field() {
        let index = seeded();
        let request = SearchRequest {
            query: SearchQuery::Match {
                field: "title".into(),
                text: "star".into(),
            },
            sort: vec![SortKey::Score, SortKey::Field("imdb_rating".into())],
            from: 0,
            size: 10,
        };
        let hits = index.search("movies", &request).await.unwrap();
        assert_eq!(hits.total, 2);
        // "Star Trek Star" matches one distinct query token, same as "Star Wars".
        assert_eq!(ids(&hits), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn match_all_sorts_missing_last_and_paginates() {
        let index = seeded();
        let request = SearchRequest {
            query: SearchQuery::MatchAll,
            sort: vec![SortKey::Field("imdb_rating".into())],
            from: 1,
            size: 5,
        };
        let hits = index.search("movies", &request).await.unwrap();
        assert_eq!(hits.total, 3);
        assert_eq!(ids(&hits), vec!["2", "3"]);
    }

    #[tokio::test]
    async fn nested_term_filters() {
        let index = seeded();
        let request = SearchRequest {
            query: SearchQuery::NestedTerm {
                path: "genres".into(),
                field: "genres.id".into(),
                value: "g2".into(),
            },
            sort: vec![],
            from: 0,
            size: 10,
        };
        let hits = index.search("movies", &request).await.unwrap();
        assert_eq!(ids(&hits), vec!["2"]);
    }

    #[tokio::test]
    async fn bulk_records_batches_and_injected_failures() {
        let index = MemoryIndex::new();
        let item = |id: &str| BulkItem {
            id: id.into(),
            source: json!({ "id": id }),
        };
        index.fail_bulk_from(1);
        index.bulk_upsert("genres", &[item("a"), item("b")]).await.unwrap();
        assert!(index.bulk_upsert("genres", &[item("c")]).await.is_err());
        assert_eq!(index.bulk_batches(), vec![vec!["a".to_string(), "b".to_string()]]);
        assert_eq!(index.len("genres"), 2);
    }

    #[tokio::test]
    async fn get_counts_calls() {
        let index = seeded();
        assert!(index.get_document("movies", "1").await.unwrap().is_some());
        assert!(index.get_document("movies", "missing").await.unwrap().is_none());
        assert_eq!(index.get_calls(), 2);
    }
}
