//! Elasticsearch HTTP client.

use async_trait::async_trait;
use cinesync_types::config::ElasticsearchConfig;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::backend::{BulkItem, BulkSummary, DocumentSink, SearchHits, SearchIndex};
use crate::error::IndexError;
use crate::query::SearchRequest;

/// Cheaply cloneable handle to an Elasticsearch-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ElasticClient {
    http: Client,
    base_url: String,
}

impl ElasticClient {
    /// Build a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &ElasticsearchConfig) -> Result<Self, IndexError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check the cluster answers.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the endpoint is unreachable or unhealthy.
    pub async fn ping(&self) -> Result<(), IndexError> {
        let response = self.http.get(self.url("/")).send().await?;
        ensure_success(response).await.map(drop)
    }

    /// # Errors
    ///
    /// Returns [`IndexError`] on transport failures or unexpected statuses.
    pub async fn index_exists(&self, index: &str) -> Result<bool, IndexError> {
        let response = self.http.head(self.url(index)).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(IndexError::Status {
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    /// Create `index` with the given settings and mappings.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the index cannot be created.
    pub async fn create_index(&self, index: &str, definition: &Value) -> Result<(), IndexError> {
        let response = self.http.put(self.url(index)).json(definition).send().await?;
        ensure_success(response).await.map(drop)
    }

    /// Create `index` unless it already exists. Returns `true` if created.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the existence check or creation fails.
    pub async fn ensure_index(&self, index: &str, definition: &Value) -> Result<bool, IndexError> {
        if self.index_exists(index).await? {
            tracing::debug!(index, "Index already exists");
            return Ok(false);
        }
        self.create_index(index, definition).await?;
        tracing::info!(index, "Index created");
        Ok(true)
    }
}

async fn ensure_success(response: Response) -> Result<Response, IndexError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(IndexError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Render bulk upserts as the newline-delimited `_bulk` body.
fn bulk_body(index: &str, items: &[BulkItem]) -> Result<String, IndexError> {
    let mut body = String::new();
    for item in items {
        let action = serde_json::json!({ "index": { "_index": index, "_id": item.id } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&item.source)?);
        body.push('\n');
    }
    Ok(body)
}

/// Inspect a `_bulk` response; any item error fails the whole batch.
fn check_bulk_response(response: &Value, total: usize) -> Result<BulkSummary, IndexError> {
    if !response
        .get("errors")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return Ok(BulkSummary { indexed: total });
    }

    let items = response
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| IndexError::Decode("bulk response without items".into()))?;
    let failures: Vec<&Value> = items
        .iter()
        .filter_map(|item| item.as_object()?.values().next()?.get("error"))
        .collect();
    let first_error = failures
        .first()
        .map_or_else(|| "unknown".to_string(), |e| e.to_string());
    Err(IndexError::BulkRejected {
        failed: failures.len(),
        total,
        first_error,
    })
}

fn parse_hits(response: &Value) -> Result<SearchHits, IndexError> {
    let hits = response
        .get("hits")
        .ok_or_else(|| IndexError::Decode("search response without hits".into()))?;
    // `hits.total` is an object since 7.x, a bare number before.
    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(obj) => obj.get("value").and_then(Value::as_u64),
        None => None,
    }
    .ok_or_else(|| IndexError::Decode("search response without hits.total".into()))?;
    let hits = hits
        .get("hits")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|hit| hit.get("_source").cloned())
                .collect()
        })
        .unwrap_or_default();
    Ok(SearchHits { total, hits })
}

#[async_trait]
impl DocumentSink for ElasticClient {
    async fn bulk_upsert(
        &self,
        index: &str,
        items: &[BulkItem],
    ) -> Result<BulkSummary, IndexError> {
        if items.is_empty() {
            return Ok(BulkSummary::default());
        }
        let body = bulk_body(index, items)?;
        let response = self
            .http
            .post(self.url("_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let response: Value = ensure_success(response).await?.json().await?;
        let summary = check_bulk_response(&response, items.len())?;
        tracing::debug!(index, count = summary.indexed, "Bulk write accepted");
        Ok(summary)
    }
}

#[async_trait]
impl SearchIndex for ElasticClient {
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, IndexError> {
        let response = self
            .http
            .get(self.url(&format!("{index}/_doc/{id}")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let mut body: Value = ensure_success(response).await?.json().await?;
        if body.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }
        body.get_mut("_source")
            .map(Value::take)
            .map(Some)
            .ok_or_else(|| IndexError::Decode(format!("document {id} without _source")))
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchHits, IndexError> {
        let response = self
            .http
            .post(self.url(&format!("{index}/_search")))
            .json(&request.to_json())
            .send()
            .await?;
        let body: Value = ensure_success(response).await?.json().await?;
        parse_hits(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bulk_body_is_ndjson_pairs() {
        let items = vec![
            BulkItem {
                id: "a".into(),
                source: json!({"id": "a"}),
            },
            BulkItem {
                id: "b".into(),
                source: json!({"id": "b"}),
            },
        ];
        let body = bulk_body("genres", &items).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));
        let action: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(action["index"]["_index"], "genres");
        assert_eq!(action["index"]["_id"], "b");
    }

    #[test]
    fn bulk_response_with_errors_is_rejected() {
        let response = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "a", "status": 201}},
                {"index": {"_id": "b", "status": 400,
                           "error": {"type": "mapper_parsing_exception"}}}
            ]
        });
        match check_bulk_response(&response, 2) {
            Err(IndexError::BulkRejected {
                failed,
                total,
                first_error,
            }) => {
                assert_eq!(failed, 1);
                assert_eq!(total, 2);
                assert!(first_error.contains("mapper_parsing_exception"));
            }
            other => panic!("expected BulkRejected, got {other:?}"),
        }
    }

    #[test]
    fn clean_bulk_response_counts_all() {
        let response = json!({ "errors": false, "items": [] });
        assert_eq!(check_bulk_response(&response, 3).unwrap().indexed, 3);
    }

    #[test]
    fn hits_parse_both_total_shapes() {
        let modern = json!({"hits": {"total": {"value": 50, "relation": "eq"},
                                     "hits": [{"_source": {"id": "x"}}]}});
        let hits = parse_hits(&modern).unwrap();
        assert_eq!(hits.total, 50);
        assert_eq!(hits.hits, vec![json!({"id": "x"})]);

        let legacy = json!({"hits": {"total": 0, "hits": []}});
        assert_eq!(parse_hits(&legacy).unwrap().total, 0);
    }

    #[test]
    fn base_url_is_normalized() {
        let client = ElasticClient::new(&ElasticsearchConfig {
            url: "http://localhost:9200/".into(),
            timeout_ms: 100,
        })
        .unwrap();
        assert_eq!(client.url("/movies/_search"), "http://localhost:9200/movies/_search");
    }
}
