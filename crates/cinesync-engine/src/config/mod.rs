//! Configuration loading: `${VAR}` substitution, YAML parsing, validation.

pub mod parser;
pub mod validator;

use std::path::Path;

use anyhow::Result;
use cinesync_types::config::AppConfig;

pub use parser::{parse_config, parse_config_str, substitute_env_vars};
pub use validator::validate_config;

/// Parse and validate the configuration file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, references unset
/// environment variables, is not valid YAML, or fails validation.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let config = parse_config(path)?;
    validate_config(&config)?;
    Ok(config)
}
