//! Index access traits.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::IndexError;
use crate::query::SearchRequest;

/// One upsert operation of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    pub id: String,
    pub source: Value,
}

/// Outcome of a successful bulk request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub indexed: usize,
}

/// Page of hits returned by [`SearchIndex::search`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    /// Total number of matching documents, not just this page.
    pub total: u64,
    /// `_source` of each hit on the requested page, in ranking order.
    pub hits: Vec<Value>,
}

/// Write side of the index: bulk upserts.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Upsert every item in one request.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the request fails or any item is rejected;
    /// a partially rejected batch is a failure.
    async fn bulk_upsert(&self, index: &str, items: &[BulkItem])
        -> Result<BulkSummary, IndexError>;
}

/// Read side of the index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Fetch a document's `_source` by id. `Ok(None)` when it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] on transport or response failures.
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, IndexError>;

    /// Run a paginated query.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] on transport or response failures.
    async fn search(&self, index: &str, request: &SearchRequest)
        -> Result<SearchHits, IndexError>;
}
