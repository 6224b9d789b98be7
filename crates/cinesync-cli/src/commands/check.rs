use std::path::Path;

use anyhow::Result;
use cinesync_api::RedisCache;
use cinesync_engine::config::load_config;
use cinesync_engine::source::{PgSource, SourceStore};
use cinesync_index::ElasticClient;

/// Execute the `check` command: validate config and reach every backend.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    println!("Config:            OK");

    let postgres = match PgSource::connect(&config.postgres).await {
        Ok(mut source) => {
            let ping = source.ping().await;
            source.close().await;
            ping.map_err(|e| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    };
    print_check("Postgres", &postgres);

    let elasticsearch = match ElasticClient::new(&config.elasticsearch) {
        Ok(client) => client.ping().await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    print_check("Elasticsearch", &elasticsearch);

    let redis = match RedisCache::connect(&config.redis).await {
        Ok(cache) => cache.ping().await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    print_check("Redis", &redis);

    if postgres.is_ok() && elasticsearch.is_ok() && redis.is_ok() {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}

fn print_check(label: &str, result: &Result<(), String>) {
    match result {
        Ok(()) => println!("{:18} OK", format!("{label}:")),
        Err(message) => {
            println!("{:18} FAILED", format!("{label}:"));
            println!("  {message}");
        }
    }
}
