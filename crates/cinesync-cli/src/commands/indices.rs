use std::path::Path;

use anyhow::{Context, Result};
use cinesync_engine::config::load_config;
use cinesync_index::mapping::index_definitions;
use cinesync_index::ElasticClient;

/// Execute the `init-indices` command: create every missing index.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let client = ElasticClient::new(&config.elasticsearch)?;

    for (name, definition) in index_definitions(&config.indices) {
        let created = client
            .ensure_index(&name, &definition)
            .await
            .with_context(|| format!("Failed to create index '{name}'"))?;
        let status = if created { "created" } else { "exists" };
        println!("{:18} {status}", format!("{name}:"));
    }
    Ok(())
}
