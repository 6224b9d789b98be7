//! Configuration model shared by the ETL loop and the query services.
//!
//! Parsing (with `${VAR}` substitution) and semantic validation live in
//! `cinesync-engine::config`; these are the plain `serde` types.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub version: String,
    pub postgres: PostgresConfig,
    pub elasticsearch: ElasticsearchConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub indices: IndexNames,
    #[serde(default)]
    pub etl: EtlConfig,
}

/// Relational source connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// Schema holding the film, genre and person tables.
    #[serde(default = "default_pg_schema")]
    pub schema: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pg_schema() -> String {
    "content".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Search index endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ElasticsearchConfig {
    pub url: String,
    #[serde(default = "default_es_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_es_timeout_ms() -> u64 {
    5_000
}

impl ElasticsearchConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Cache endpoint and entry lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_redis_timeout_ms() -> u64 {
    500
}

impl RedisConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Index names per document kind.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexNames {
    #[serde(default = "default_films_index")]
    pub films: String,
    #[serde(default = "default_genres_index")]
    pub genres: String,
    #[serde(default = "default_persons_index")]
    pub persons: String,
}

fn default_films_index() -> String {
    "movies".to_string()
}

fn default_genres_index() -> String {
    "genres".to_string()
}

fn default_persons_index() -> String {
    "persons".to_string()
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            films: default_films_index(),
            genres: default_genres_index(),
            persons: default_persons_index(),
        }
    }
}

/// Write-path loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
    /// Documents per bulk-write call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between iterations.
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,
    #[serde(default)]
    pub retry: BackoffPolicy,
    #[serde(default)]
    pub state: StateConfig,
}

fn default_batch_size() -> usize {
    500
}

fn default_pause_secs() -> u64 {
    60
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pause_secs: default_pause_secs(),
            retry: BackoffPolicy::default(),
            state: StateConfig::default(),
        }
    }
}

impl EtlConfig {
    #[must_use]
    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }
}

/// Exponential backoff for establishing connections.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BackoffPolicy {
    /// Connection attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Which state backend persists watermarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackendKind {
    #[default]
    JsonFile,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackendKind,
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state/etl_state.json")
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackendKind::default(),
            path: default_state_path(),
        }
    }
}
