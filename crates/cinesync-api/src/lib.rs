//! Read path of cinesync.
//!
//! [`CacheAsideService`] answers single-item and paginated list reads for
//! one [`Resource`] (films, genres or persons): it checks the [`Cache`],
//! falls back to the [`SearchIndex`](cinesync_index::SearchIndex) on a
//! miss and populates the cache with a fixed TTL. Cache failures degrade
//! to index reads.

#![warn(clippy::pedantic)]

pub mod cache;
pub mod error;
pub mod page;
pub mod query;
pub mod resource;
pub mod service;

pub use cache::{Cache, MemoryCache, RedisCache};
pub use error::{CacheError, ServiceError};
pub use page::Page;
pub use query::{Criteria, ListQuery};
pub use resource::{Films, Genres, Persons, Resource};
pub use service::{CacheAsideService, ReadServices};
