use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cinesync_api::{
    Cache, CacheAsideService, Criteria, ListQuery, MemoryCache, ReadServices, RedisCache,
    Resource,
};
use cinesync_engine::config::load_config;
use cinesync_index::ElasticClient;
use clap::ValueEnum;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResourceKind {
    Films,
    Genres,
    Persons,
}

/// Wire the read services from config.
///
/// An unreachable Redis is not fatal: reads fall back to a process-local
/// cache, which for a one-shot command means every read hits the index.
async fn services(config_path: &Path) -> Result<ReadServices> {
    let config = load_config(config_path)?;
    let index = ElasticClient::new(&config.elasticsearch)?;

    let cache: Arc<dyn Cache> = match RedisCache::connect(&config.redis).await {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, reading without shared cache");
            Arc::new(MemoryCache::new())
        }
    };

    Ok(ReadServices::new(
        Arc::new(index),
        cache,
        &config.indices,
        config.redis.ttl(),
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}

async fn get_one<R: Resource>(service: &CacheAsideService<R>, id: Uuid) -> Result<()> {
    match service.get_by_id(id).await? {
        Some(item) => print_json(&item),
        None => anyhow::bail!("{} {id} not found", R::NAME),
    }
}

async fn list_page<R: Resource>(service: &CacheAsideService<R>, query: &ListQuery) -> Result<()> {
    let page = service.list(query).await?;
    print_json(&page)
}

/// Execute the `get` command.
pub async fn get(config_path: &Path, resource: ResourceKind, id: Uuid) -> Result<()> {
    let services = services(config_path).await?;
    match resource {
        ResourceKind::Films => get_one(&services.films, id).await,
        ResourceKind::Genres => get_one(&services.genres, id).await,
        ResourceKind::Persons => get_one(&services.persons, id).await,
    }
}

/// Execute the `list` command.
pub async fn list(
    config_path: &Path,
    resource: ResourceKind,
    page: u32,
    size: u32,
    query: Option<String>,
    filter: Option<String>,
) -> Result<()> {
    let criteria = match (query, filter) {
        (Some(text), _) => Criteria::Search(text),
        (None, Some(value)) => Criteria::Filter(value),
        (None, None) => Criteria::All,
    };
    let query = ListQuery::new(page, size, criteria)?;

    let services = services(config_path).await?;
    match resource {
        ResourceKind::Films => list_page(&services.films, &query).await,
        ResourceKind::Genres => list_page(&services.genres, &query).await,
        ResourceKind::Persons => list_page(&services.persons, &query).await,
    }
}
