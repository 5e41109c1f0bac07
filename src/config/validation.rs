//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (chain ids are unique)
//! - Validate value ranges (timeouts > 0, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SdkConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::schema::{CacheTime, SdkConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &SdkConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.cache.value_cache_time == CacheTime::Millis(0) {
        errors.push(ValidationError::new(
            "cache.value_cache_time",
            "must be greater than zero; disable caching instead",
        ));
    }
    if config.cache.max_entries == Some(0) {
        errors.push(ValidationError::new("cache.max_entries", "must be greater than zero"));
    }
    if config.cache.broadcast_capacity == 0 {
        errors.push(ValidationError::new(
            "cache.broadcast_capacity",
            "must be greater than zero",
        ));
    }

    let mut seen = HashSet::new();
    for (i, chain) in config.chains.iter().enumerate() {
        let prefix = format!("chains[{}]", i);
        if chain.chain_id == 0 {
            errors.push(ValidationError::new(format!("{prefix}.chain_id"), "must be non-zero"));
        }
        if !seen.insert(chain.chain_id) {
            errors.push(ValidationError::new(
                format!("{prefix}.chain_id"),
                format!("duplicate chain id {}", chain.chain_id),
            ));
        }
        for url in std::iter::once(&chain.rpc_url).chain(chain.failover_urls.iter()) {
            if let Err(e) = url::Url::parse(url) {
                errors.push(ValidationError::new(
                    format!("{prefix}.rpc_url"),
                    format!("invalid URL '{}': {}", url, e),
                ));
            }
        }
        if chain.rpc_timeout_secs == 0 {
            errors.push(ValidationError::new(
                format!("{prefix}.rpc_timeout_secs"),
                "must be greater than zero",
            ));
        }
        if chain.poll_interval_ms == 0 {
            errors.push(ValidationError::new(
                format!("{prefix}.poll_interval_ms"),
                "must be greater than zero",
            ));
        }
        if chain.gas_price_multiplier < 1.0 {
            errors.push(ValidationError::new(
                format!("{prefix}.gas_price_multiplier"),
                "must be at least 1.0",
            ));
        }
    }

    if let Some(url) = &config.indexer.url {
        if let Err(e) = url::Url::parse(url) {
            errors.push(ValidationError::new("indexer.url", format!("invalid URL: {}", e)));
        }
    }
    if config.indexer.poll_interval_ms == 0 {
        errors.push(ValidationError::new("indexer.poll_interval_ms", "must be greater than zero"));
    }

    if let Err(e) = url::Url::parse(&config.ipfs.gateway_url) {
        errors.push(ValidationError::new("ipfs.gateway_url", format!("invalid URL: {}", e)));
    }
    if let Some(url) = &config.ipfs.pin_url {
        if let Err(e) = url::Url::parse(url) {
            errors.push(ValidationError::new("ipfs.pin_url", format!("invalid URL: {}", e)));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ChainConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SdkConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = SdkConfig::default();
        config.cache.max_entries = Some(0);
        config.chains.push(ChainConfig::default());
        config.chains.push(ChainConfig {
            rpc_url: "not a url".into(),
            poll_interval_ms: 0,
            ..ChainConfig::default()
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"cache.max_entries"));
        assert!(fields.contains(&"chains[1].chain_id"));
        assert!(fields.contains(&"chains[1].rpc_url"));
        assert!(fields.contains(&"chains[1].poll_interval_ms"));
    }
}
