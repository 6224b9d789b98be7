//! Semantic validation for parsed configuration values.

use anyhow::{bail, Result};
use cinesync_types::config::AppConfig;

fn require_non_empty(value: &str, field: &str, errors: &mut Vec<String>) {
    if value.trim().is_empty() {
        errors.push(format!("{field} must not be empty"));
    }
}

fn validate_index_name(name: &str, field: &str, errors: &mut Vec<String>) {
    if name.trim().is_empty() {
        errors.push(format!("{field} must not be empty"));
    } else if name.chars().any(|c| c.is_uppercase() || c.is_whitespace()) {
        errors.push(format!(
            "{field} '{name}' is invalid: index names must be lowercase without spaces"
        ));
    }
}

/// Validate a parsed configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the config.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported config version '{}', expected '1.0'",
            config.version
        ));
    }

    require_non_empty(&config.postgres.host, "postgres.host", &mut errors);
    require_non_empty(&config.postgres.user, "postgres.user", &mut errors);
    require_non_empty(&config.postgres.database, "postgres.database", &mut errors);
    require_non_empty(&config.postgres.schema, "postgres.schema", &mut errors);
    require_non_empty(&config.elasticsearch.url, "elasticsearch.url", &mut errors);
    require_non_empty(&config.redis.url, "redis.url", &mut errors);

    if config.redis.ttl_secs == 0 {
        errors.push("redis.ttl_secs must be at least 1".to_string());
    }

    validate_index_name(&config.indices.films, "indices.films", &mut errors);
    validate_index_name(&config.indices.genres, "indices.genres", &mut errors);
    validate_index_name(&config.indices.persons, "indices.persons", &mut errors);

    let etl = &config.etl;
    if etl.batch_size == 0 {
        errors.push("etl.batch_size must be at least 1".to_string());
    }
    if etl.retry.max_attempts == 0 {
        errors.push("etl.retry.max_attempts must be at least 1".to_string());
    }
    if etl.retry.base_delay_ms > etl.retry.max_delay_ms {
        errors.push(format!(
            "etl.retry.base_delay_ms ({}) exceeds max_delay_ms ({})",
            etl.retry.base_delay_ms, etl.retry.max_delay_ms
        ));
    }
    if etl.state.path.as_os_str().is_empty() {
        errors.push("etl.state.path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Config validation failed:\n  - {}", errors.join("\n  - "));
    }
}
