//! Search index access for cinesync.
//!
//! The write path needs a [`DocumentSink`] (bulk upserts); the read path
//! needs a [`SearchIndex`] (lookups by id and paginated queries). Both are
//! implemented by [`ElasticClient`] over HTTP and by [`MemoryIndex`] for
//! tests and local runs.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod elastic;
pub mod error;
pub mod mapping;
pub mod memory;
pub mod query;

pub use backend::{BulkItem, BulkSummary, DocumentSink, SearchHits, SearchIndex};
pub use elastic::ElasticClient;
pub use error::IndexError;
pub use memory::MemoryIndex;
pub use query::{SearchQuery, SearchRequest, SortKey};
