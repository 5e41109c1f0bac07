//! Reading configuration from TOML.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::SdkConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Parse TOML text, then validate it.
pub fn parse_config(content: &str) -> Result<SdkConfig, ConfigError> {
    let config = SdkConfig::from_toml_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<SdkConfig, ConfigError> {
    let config = parse_config(&fs::read_to_string(path)?)?;

    tracing::info!(
        path = %path.display(),
        chains = config.chains.len(),
        cache_enabled = config.cache.enabled,
        "Configuration loaded"
    );
    Ok(config)
}
