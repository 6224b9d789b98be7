//! ETL session lifecycle and the run loop.

use std::sync::Arc;
use std::time::Duration;

use cinesync_index::DocumentSink;
use cinesync_state::watermark::{self, Watermarks};
use cinesync_state::{StateBackend, StateError};
use cinesync_types::config::{AppConfig, IndexNames};
use cinesync_types::{EtlStatus, WatermarkKey};
use tokio_util::sync::CancellationToken;

use crate::connector::Connector;
use crate::errors::PipelineError;
use crate::extract::{extract_film_changes, extract_genre_changes, extract_person_changes};
use crate::loader::BatchLoader;
use crate::source::SourceStore;
use crate::transform::{transform_films, transform_genres, transform_persons};

/// Settings of the write loop.
#[derive(Debug, Clone)]
pub struct EtlSettings {
    pub indices: IndexNames,
    pub batch_size: usize,
    pub pause: Duration,
}

impl EtlSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            indices: config.indices.clone(),
            batch_size: config.etl.batch_size,
            pause: config.etl.pause(),
        }
    }
}

/// Documents loaded per sub-pipeline in one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationReport {
    pub films: usize,
    pub persons: usize,
    pub genres: usize,
}

/// Run a blocking state operation off the async runtime.
async fn with_state<T, F>(state: &Arc<dyn StateBackend>, op: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce(&dyn StateBackend) -> Result<T, StateError> + Send + 'static,
{
    let state = Arc::clone(state);
    Ok(tokio::task::spawn_blocking(move || op(state.as_ref())).await??)
}

/// One connected pass over the source: `start`, any number of
/// iterations, `stop`.
pub struct EtlSession {
    source: Box<dyn SourceStore>,
    sink: Arc<dyn DocumentSink>,
    state: Arc<dyn StateBackend>,
    settings: EtlSettings,
    stopped: bool,
}

impl EtlSession {
    /// Mark the process started and connect source and sink.
    ///
    /// A connection failure marks the process stopped again and is
    /// returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Connect`] when either side is unreachable,
    /// or a state error if the status cannot be written.
    pub async fn start(
        connector: &dyn Connector,
        state: Arc<dyn StateBackend>,
        settings: EtlSettings,
    ) -> Result<Self, PipelineError> {
        with_state(&state, |s| watermark::set_status(s, EtlStatus::Started)).await?;
        tracing::info!("ETL process started");

        let mut source = match connector.connect_source().await {
            Ok(source) => source,
            Err(err) => return Err(abort_start(&state, err).await),
        };
        let sink = match connector.connect_sink().await {
            Ok(sink) => sink,
            Err(err) => {
                source.close().await;
                return Err(abort_start(&state, err).await);
            }
        };

        Ok(Self {
            source,
            sink,
            state,
            settings,
            stopped: false,
        })
    }

    /// Run the films, persons and genres sub-pipelines in order.
    ///
    /// A document that fails validation aborts only its own sub-pipeline:
    /// the remaining ones still load and commit, and the first rejection is
    /// returned once they are done.
    ///
    /// # Errors
    ///
    /// Source, load and state failures end the iteration at once and leave
    /// the failed sub-pipeline's watermarks uncommitted. Validation
    /// failures are returned after the other sub-pipelines ran.
    pub async fn run_iteration(&mut self) -> Result<IterationReport, PipelineError> {
        let mut watermarks = with_state(&self.state, |s| Watermarks::load(s)).await?;
        let mut rejected = None;
        let films = absorb_rejection(self.run_films(&mut watermarks).await, &mut rejected)?;
        let persons = absorb_rejection(self.run_persons(&mut watermarks).await, &mut rejected)?;
        let genres = absorb_rejection(self.run_genres(&mut watermarks).await, &mut rejected)?;
        let report = IterationReport {
            films,
            persons,
            genres,
        };
        tracing::info!(
            films = report.films,
            persons = report.persons,
            genres = report.genres,
            rejected = rejected.is_some(),
            "ETL iteration complete"
        );
        match rejected {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    async fn run_films(&self, watermarks: &mut Watermarks) -> Result<usize, PipelineError> {
        let changes = extract_film_changes(self.source.as_ref(), watermarks).await?;
        if changes.is_empty() {
            tracing::debug!(entity = "film", "No changes");
            return Ok(0);
        }

        let loaded = if changes.film_count() == 0 {
            0
        } else {
            let loader = BatchLoader::new(
                self.sink.as_ref(),
                &self.settings.indices.films,
                self.settings.batch_size,
            );
            loader
                .load(transform_films(changes.rows))
                .await
                .inspect_err(|e| log_failure("film", e))?
                .documents
        };

        let keys: Vec<WatermarkKey> = changes.advances.iter().map(|(k, _)| *k).collect();
        for (key, ts) in changes.advances {
            watermarks.advance(key, ts);
        }
        self.commit(watermarks, keys).await?;
        Ok(loaded)
    }

    async fn run_persons(&self, watermarks: &mut Watermarks) -> Result<usize, PipelineError> {
        let changes = extract_person_changes(self.source.as_ref(), watermarks).await?;
        let Some(ts) = changes.watermark else {
            tracing::debug!(entity = "person", "No changes");
            return Ok(0);
        };
        let loader = BatchLoader::new(
            self.sink.as_ref(),
            &self.settings.indices.persons,
            self.settings.batch_size,
        );
        let summary = loader
            .load(transform_persons(changes.rows))
            .await
            .inspect_err(|e| log_failure("person", e))?;
        watermarks.advance(WatermarkKey::PersonIndex, ts);
        self.commit(watermarks, vec![WatermarkKey::PersonIndex]).await?;
        Ok(summary.documents)
    }

    async fn run_genres(&self, watermarks: &mut Watermarks) -> Result<usize, PipelineError> {
        let changes = extract_genre_changes(self.source.as_ref(), watermarks).await?;
        let Some(ts) = changes.watermark else {
            tracing::debug!(entity = "genre", "No changes");
            return Ok(0);
        };
        let loader = BatchLoader::new(
            self.sink.as_ref(),
            &self.settings.indices.genres,
            self.settings.batch_size,
        );
        let summary = loader
            .load(transform_genres(changes.rows))
            .await
            .inspect_err(|e| log_failure("genre", e))?;
        watermarks.advance(WatermarkKey::GenreIndex, ts);
        self.commit(watermarks, vec![WatermarkKey::GenreIndex]).await?;
        Ok(summary.documents)
    }

    async fn commit(
        &self,
        watermarks: &Watermarks,
        keys: Vec<WatermarkKey>,
    ) -> Result<(), PipelineError> {
        let snapshot = watermarks.clone();
        with_state(&self.state, move |s| snapshot.commit(s, &keys)).await
    }

    /// Close the source and mark the process stopped. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a state error if the status cannot be written.
    pub async fn stop(&mut self) -> Result<(), PipelineError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.source.close().await;
        with_state(&self.state, |s| watermark::set_status(s, EtlStatus::Stopped)).await?;
        tracing::info!("ETL process stopped");
        Ok(())
    }
}

/// Keep a validation failure aside so the next sub-pipeline still runs.
fn absorb_rejection(
    outcome: Result<usize, PipelineError>,
    rejected: &mut Option<PipelineError>,
) -> Result<usize, PipelineError> {
    match outcome {
        Err(err @ PipelineError::Validation(_)) => {
            if rejected.is_none() {
                *rejected = Some(err);
            }
            Ok(0)
        }
        other => other,
    }
}

async fn abort_start(state: &Arc<dyn StateBackend>, err: PipelineError) -> PipelineError {
    tracing::error!(error = %err, "ETL process could not start");
    match with_state(state, |s| watermark::set_status(s, EtlStatus::Stopped)).await {
        Ok(()) => tracing::info!("ETL process stopped"),
        Err(state_err) => {
            tracing::error!(error = %state_err, "Failed to record stopped status");
        }
    }
    err
}

fn log_failure(entity: &'static str, err: &PipelineError) {
    match err {
        PipelineError::Validation(doc) => tracing::error!(
            entity,
            id = %doc.id,
            reason = %doc.reason,
            "Document failed validation, aborting sub-pipeline"
        ),
        other => tracing::error!(entity, error = %other, "Load failed, watermark not committed"),
    }
}

/// Start a session, run one iteration, stop.
///
/// # Errors
///
/// Returns the start failure or the iteration failure; `stop` runs in
/// both the success and the iteration-failure case.
pub async fn run_once(
    connector: &dyn Connector,
    state: Arc<dyn StateBackend>,
    settings: EtlSettings,
) -> Result<IterationReport, PipelineError> {
    let mut session = EtlSession::start(connector, state, settings).await?;
    let outcome = session.run_iteration().await;
    let stopped = session.stop().await;
    let report = outcome?;
    stopped?;
    Ok(report)
}

/// Run iterations separated by `settings.pause` until `cancel` fires.
///
/// Every iteration opens its own session, and `stop` runs whether the
/// iteration succeeded, failed or was cancelled. Non-fatal iteration
/// failures are logged and retried after the pause.
///
/// # Errors
///
/// Returns start failures and fatal iteration failures.
pub async fn run_forever(
    connector: &dyn Connector,
    state: Arc<dyn StateBackend>,
    settings: EtlSettings,
    cancel: CancellationToken,
) -> Result<(), PipelineError> {
    let pause = settings.pause;
    loop {
        let started = tokio::select! {
            () = cancel.cancelled() => {
                with_state(&state, |s| watermark::set_status(s, EtlStatus::Stopped)).await?;
                tracing::info!("ETL process stopped");
                return Ok(());
            }
            started = EtlSession::start(connector, Arc::clone(&state), settings.clone()) => started,
        };
        let mut session = started?;

        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(PipelineError::Cancelled),
            outcome = session.run_iteration() => outcome,
        };
        session.stop().await?;

        match outcome {
            Ok(_) => {}
            Err(PipelineError::Cancelled) => {
                tracing::info!("ETL loop cancelled");
                return Ok(());
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::error!(error = %err, "ETL iteration failed, will retry after pause");
            }
        }

        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("ETL loop cancelled");
                return Ok(());
            }
            () = tokio::time::sleep(pause) => {}
        }
    }
}
