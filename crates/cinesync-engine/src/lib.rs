//! Write path of cinesync: keeps the search indices in step with the
//! relational movies database.
//!
//! One iteration runs three sub-pipelines (films, persons, genres), each
//! extracting rows changed since its watermarks, denormalizing them into
//! index documents, bulk-loading them and only then committing the
//! watermarks.

pub mod config;
pub mod connector;
pub mod errors;
pub mod extract;
pub mod loader;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod orchestrator;
pub mod retry;
pub mod source;
pub mod transform;

pub use connector::{Connector, LiveConnector};
pub use errors::PipelineError;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryConnector, MemorySource};
pub use orchestrator::{run_forever, run_once, EtlSession, EtlSettings, IterationReport};
pub use source::{SourceError, SourceStore, SourceTable};
