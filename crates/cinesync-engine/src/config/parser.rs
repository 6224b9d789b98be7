//! Config YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use cinesync_types::config::AppConfig;
use regex::Regex;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();
    let result = ENV_VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        std::env::var(&cap[1]).unwrap_or_else(|_| {
            missing.push(cap[1].to_string());
            String::new()
        })
    });

    if !missing.is_empty() {
        missing.sort_unstable();
        missing.dedup();
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result.into_owned())
}

/// Parse a config YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_config_str(yaml_str: &str) -> Result<AppConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: AppConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse config YAML")?;
    Ok(config)
}

/// Parse a config YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinesync_types::config::StateBackendKind;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CS_TEST_HOST", "db.example.com");
        let input = "host: ${CS_TEST_HOST}\nport: 5432";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "host: db.example.com\nport: 5432");
        std::env::remove_var("CS_TEST_HOST");
    }

    #[test]
    fn test_repeated_env_var() {
        std::env::set_var("CS_TEST_REPEAT", "x");
        let result = substitute_env_vars("${CS_TEST_REPEAT}-${CS_TEST_REPEAT}").unwrap();
        assert_eq!(result, "x-x");
        std::env::remove_var("CS_TEST_REPEAT");
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "host: localhost\nport: 5432";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_multiple_missing_env_vars_all_reported() {
        let input = "${CS_MISSING_X} and ${CS_MISSING_Y}";
        let err_msg = substitute_env_vars(input).unwrap_err().to_string();
        assert!(err_msg.contains("CS_MISSING_X"));
        assert!(err_msg.contains("CS_MISSING_Y"));
    }

    #[test]
    fn test_missing_env_var_reported_once() {
        let input = "${CS_MISSING_A} ${CS_MISSING_B} ${CS_MISSING_A}";
        let err_msg = substitute_env_vars(input).unwrap_err().to_string();
        assert_eq!(err_msg.matches("CS_MISSING_A").count(), 1, "{err_msg}");
        assert!(err_msg.ends_with("CS_MISSING_A, CS_MISSING_B"), "{err_msg}");
    }

    #[test]
    fn test_parse_config_from_string() {
        std::env::set_var("CS_TEST_PG_PASS", "secret");
        let yaml = r#"
version: "1.0"
postgres:
  host: localhost
  user: app
  password: ${CS_TEST_PG_PASS}
  database: movies_database
elasticsearch:
  url: http://localhost:9200
redis:
  url: redis://localhost:6379
etl:
  batch_size: 100
  state:
    backend: sqlite
    path: /tmp/etl.db
"#;
        let config = parse_config_str(yaml).unwrap();
        assert_eq!(config.postgres.password, "secret");
        assert_eq!(config.postgres.port, 5432);
        assert_eq!(config.postgres.schema, "content");
        assert_eq!(config.etl.batch_size, 100);
        assert_eq!(config.etl.pause_secs, 60);
        assert_eq!(config.etl.state.backend, StateBackendKind::Sqlite);
        assert_eq!(config.indices.films, "movies");
        assert_eq!(config.redis.ttl_secs, 300);
        std::env::remove_var("CS_TEST_PG_PASS");
    }

    #[test]
    fn test_parse_invalid_yaml_errors() {
        let yaml = "this is not: [valid: yaml: {{{}}}";
        assert!(parse_config_str(yaml).is_err());
    }

    #[test]
    fn test_missing_file_errors() {
        let err = parse_config(Path::new("/nonexistent/cinesync.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
