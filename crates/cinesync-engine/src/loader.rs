//! Batched bulk loading of index documents.

use cinesync_index::{BulkItem, DocumentSink, IndexError};
use cinesync_types::{DocumentError, IndexDocument};

use crate::errors::PipelineError;

/// Totals of one [`BatchLoader::load`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub documents: usize,
    pub batches: usize,
}

/// Buffers documents and flushes them to one index in fixed-size bulk
/// requests.
pub struct BatchLoader<'a> {
    sink: &'a dyn DocumentSink,
    index: &'a str,
    batch_size: usize,
}

impl<'a> BatchLoader<'a> {
    /// A `batch_size` of zero is treated as one.
    #[must_use]
    pub fn new(sink: &'a dyn DocumentSink, index: &'a str, batch_size: usize) -> Self {
        Self {
            sink,
            index,
            batch_size: batch_size.max(1),
        }
    }

    /// Drain `documents` into bulk requests of `batch_size`, then flush the
    /// remainder.
    ///
    /// Stops at the first invalid document or failed request; batches
    /// flushed before that stay in the index.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for an invalid document and
    /// [`PipelineError::Load`] for a failed bulk request.
    pub async fn load<D, I>(&self, documents: I) -> Result<LoadSummary, PipelineError>
    where
        D: IndexDocument,
        I: IntoIterator<Item = Result<D, DocumentError>>,
    {
        let mut summary = LoadSummary::default();
        let mut buffer: Vec<BulkItem> = Vec::with_capacity(self.batch_size);

        for document in documents {
            let document = document?;
            buffer.push(BulkItem {
                id: document.doc_id().to_string(),
                source: serde_json::to_value(&document).map_err(IndexError::from)?,
            });
            if buffer.len() >= self.batch_size {
                self.flush(&mut buffer, &mut summary).await?;
            }
        }
        if !buffer.is_empty() {
            self.flush(&mut buffer, &mut summary).await?;
        }
        Ok(summary)
    }

    async fn flush(
        &self,
        buffer: &mut Vec<BulkItem>,
        summary: &mut LoadSummary,
    ) -> Result<(), PipelineError> {
        let result = self.sink.bulk_upsert(self.index, buffer).await?;
        summary.documents += buffer.len();
        summary.batches += 1;
        tracing::info!(
            index = self.index,
            batch = summary.batches,
            count = result.indexed,
            "Bulk flush"
        );
        buffer.clear();
        Ok(())
    }
}
