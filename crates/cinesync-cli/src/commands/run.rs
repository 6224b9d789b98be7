use std::path::Path;

use anyhow::Result;
use cinesync_engine::config::load_config;
use cinesync_engine::{run_forever, run_once, EtlSettings, LiveConnector};
use cinesync_types::config::AppConfig;
use tokio_util::sync::CancellationToken;

use super::open_state;

fn connector(config: &AppConfig) -> LiveConnector {
    LiveConnector::new(
        config.postgres.clone(),
        config.elasticsearch.clone(),
        config.etl.retry,
    )
}

/// Execute the `run` command: iterate until Ctrl-C.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let state = open_state(&config.etl.state)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing current step");
            trigger.cancel();
        }
    });

    tracing::info!(
        batch_size = config.etl.batch_size,
        pause_secs = config.etl.pause_secs,
        state = %config.etl.state.path.display(),
        "Starting ETL loop"
    );
    run_forever(
        &connector(&config),
        state,
        EtlSettings::from_config(&config),
        cancel,
    )
    .await?;
    Ok(())
}

/// Execute the `once` command: a single iteration.
pub async fn execute_once(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let state = open_state(&config.etl.state)?;

    let report = run_once(
        &connector(&config),
        state,
        EtlSettings::from_config(&config),
    )
    .await?;

    println!("ETL iteration completed.");
    println!("  Films indexed:   {}", report.films);
    println!("  Persons indexed: {}", report.persons);
    println!("  Genres indexed:  {}", report.genres);
    Ok(())
}
