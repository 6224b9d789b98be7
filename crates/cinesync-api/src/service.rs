//! Cache-aside read services.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use cinesync_index::SearchIndex;
use cinesync_types::config::IndexNames;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::Cache;
use crate::error::ServiceError;
use crate::page::Page;
use crate::query::ListQuery;
use crate::resource::{Films, Genres, Persons, Resource};

/// Reads of one resource: cache first, index on a miss, cache populated
/// from the index with a fixed TTL. Entries are never invalidated;
/// staleness is bounded by the TTL.
pub struct CacheAsideService<R> {
    index: Arc<dyn SearchIndex>,
    cache: Arc<dyn Cache>,
    index_name: String,
    ttl: Duration,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for CacheAsideService<R> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            cache: Arc::clone(&self.cache),
            index_name: self.index_name.clone(),
            ttl: self.ttl,
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> CacheAsideService<R> {
    #[must_use]
    pub fn new(
        index: Arc<dyn SearchIndex>,
        cache: Arc<dyn Cache>,
        names: &IndexNames,
        ttl: Duration,
    ) -> Self {
        Self {
            index,
            cache,
            index_name: R::index_name(names).to_string(),
            ttl,
            _resource: PhantomData,
        }
    }

    /// Single item by id. `Ok(None)` when the index has no such document.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the index fails or returns a document
    /// of the wrong shape. Cache failures are not errors.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<R::Detail>, ServiceError> {
        let key = format!("{}:{id}", R::CACHE_PREFIX);
        if let Some(hit) = self.cached::<R::Detail>(&key).await {
            return Ok(Some(hit));
        }

        let Some(source) = self
            .index
            .get_document(&self.index_name, &id.to_string())
            .await?
        else {
            tracing::debug!(resource = R::NAME, %id, "Not found");
            return Ok(None);
        };
        let item: R::Detail = decode::<R, _>(source)?;
        self.populate(&key, &item).await;
        Ok(Some(item))
    }

    /// One page of items matching `query`.
    ///
    /// An empty result is returned as a zero-total page and not cached.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnsupportedFilter`] for a filter on a
    /// resource without one, or index and decode failures.
    pub async fn list(&self, query: &ListQuery) -> Result<Page<R::Summary>, ServiceError> {
        let request = query.to_request::<R>()?;
        let key = query.cache_key(R::CACHE_PREFIX);
        if let Some(hit) = self.cached::<Page<R::Summary>>(&key).await {
            return Ok(hit);
        }

        let hits = self.index.search(&self.index_name, &request).await?;
        if hits.hits.is_empty() {
            tracing::debug!(resource = R::NAME, key = %key, "Empty result, not cached");
            return Ok(Page::empty(query.page(), query.size()));
        }
        let items = hits
            .hits
            .into_iter()
            .map(decode::<R, R::Summary>)
            .collect::<Result<Vec<_>, _>>()?;
        let page = Page {
            total: hits.total,
            page: query.page(),
            size: query.size(),
            items,
        };
        self.populate(&key, &page).await;
        Ok(page)
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(value) => {
                    tracing::debug!(resource = R::NAME, key, "Cache hit");
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(resource = R::NAME, key, error = %e, "Undecodable cache entry, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(resource = R::NAME, key, error = %e, "Cache unavailable, reading from index");
                None
            }
        }
    }

    async fn populate<T: Serialize>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(resource = R::NAME, key, error = %e, "Could not encode cache entry");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, payload, self.ttl).await {
            tracing::warn!(resource = R::NAME, key, error = %e, "Cache write failed");
        }
    }
}

fn decode<R: Resource, T: DeserializeOwned>(source: Value) -> Result<T, ServiceError> {
    serde_json::from_value(source).map_err(|e| ServiceError::Decode {
        resource: R::NAME,
        reason: e.to_string(),
    })
}

/// The three read services over one index client and one cache.
#[derive(Clone)]
pub struct ReadServices {
    pub films: CacheAsideService<Films>,
    pub genres: CacheAsideService<Genres>,
    pub persons: CacheAsideService<Persons>,
}

impl ReadServices {
    #[must_use]
    pub fn new(
        index: Arc<dyn SearchIndex>,
        cache: Arc<dyn Cache>,
        names: &IndexNames,
        ttl: Duration,
    ) -> Self {
        Self {
            films: CacheAsideService::new(Arc::clone(&index), Arc::clone(&cache), names, ttl),
            genres: CacheAsideService::new(Arc::clone(&index), Arc::clone(&cache), names, ttl),
            persons: CacheAsideService::new(index, cache, names, ttl),
        }
    }
}
