//! Establishing the source and sink of one ETL session.

use std::sync::Arc;

use async_trait::async_trait;
use cinesync_index::{DocumentSink, ElasticClient};
use cinesync_types::config::{BackoffPolicy, ElasticsearchConfig, PostgresConfig};

use crate::errors::PipelineError;
use crate::retry::connect_with_backoff;
use crate::source::{PgSource, SourceStore};

/// Opens the connections a session needs.
#[async_trait]
pub trait Connector: Send + Sync {
    /// # Errors
    ///
    /// Returns [`PipelineError::Connect`] if the source stays unreachable.
    async fn connect_source(&self) -> Result<Box<dyn SourceStore>, PipelineError>;

    /// # Errors
    ///
    /// Returns [`PipelineError::Connect`] if the index stays unreachable.
    async fn connect_sink(&self) -> Result<Arc<dyn DocumentSink>, PipelineError>;
}

/// Postgres source and Elasticsearch sink, both retried with backoff.
#[derive(Debug, Clone)]
pub struct LiveConnector {
    postgres: PostgresConfig,
    elasticsearch: ElasticsearchConfig,
    policy: BackoffPolicy,
}

impl LiveConnector {
    #[must_use]
    pub fn new(
        postgres: PostgresConfig,
        elasticsearch: ElasticsearchConfig,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            postgres,
            elasticsearch,
            policy,
        }
    }
}

#[async_trait]
impl Connector for LiveConnector {
    async fn connect_source(&self) -> Result<Box<dyn SourceStore>, PipelineError> {
        let source = PgSource::connect_with_retry(&self.postgres, &self.policy).await?;
        Ok(Box::new(source))
    }

    async fn connect_sink(&self) -> Result<Arc<dyn DocumentSink>, PipelineError> {
        let client = ElasticClient::new(&self.elasticsearch).map_err(|e| PipelineError::Connect {
            target: "elasticsearch",
            attempts: 0,
            reason: e.to_string(),
        })?;
        connect_with_backoff("elasticsearch", &self.policy, || {
            let client = client.clone();
            async move { client.ping().await.map(|()| client) }
        })
        .await
        .map(|client| {
            tracing::info!(url = client.base_url(), "Connected to Elasticsearch");
            Arc::new(client) as Arc<dyn DocumentSink>
        })
    }
}
