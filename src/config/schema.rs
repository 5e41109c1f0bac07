//! `SdkConfig` and its sections.
//!
//! Every section is `#[serde(default)]`, so an empty TOML document is a
//! working configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for an SDK instance.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SdkConfig {
    /// Query cache defaults.
    pub cache: CacheConfig,

    /// Chains the SDK can read from and transact on.
    pub chains: Vec<ChainConfig>,

    /// Indexer (GraphQL) settings.
    pub indexer: IndexerConfig,

    /// Content-addressed file store settings.
    pub ipfs: IpfsConfig,

    pub observability: ObservabilityConfig,
}

impl SdkConfig {
    /// Parse a configuration from TOML text without validating it.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Look up the configuration of a chain.
    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}

/// A cache lifetime that is either bounded or infinite.
///
/// In TOML: `"infinite"` or `{ millis = 1000 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTime {
    Infinite,
    Millis(u64),
}

impl CacheTime {
    /// `None` means infinite.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            CacheTime::Infinite => None,
            CacheTime::Millis(ms) => Some(Duration::from_millis(*ms)),
        }
    }
}

impl From<Duration> for CacheTime {
    fn from(d: Duration) -> Self {
        CacheTime::Millis(d.as_millis() as u64)
    }
}

/// Query cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every query behaves as if it had no key.
    pub enabled: bool,

    /// Grace period after the last consumer leaves before a producer is torn down.
    pub observable_cache_time: CacheTime,

    /// Maximum age of a buffered value before it is recomputed.
    pub value_cache_time: CacheTime,

    /// Upper bound on cache entries; least recently accessed entries are evicted.
    pub max_entries: Option<usize>,

    /// Per-stream broadcast buffer for slow consumers.
    pub broadcast_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            observable_cache_time: CacheTime::Millis(60_000),
            value_cache_time: CacheTime::Infinite,
            max_entries: None,
            broadcast_capacity: 64,
        }
    }
}

/// Per-chain RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain ID (e.g., 1 for Ethereum mainnet, 11155111 for Sepolia).
    pub chain_id: u64,

    /// Primary endpoint.
    pub rpc_url: String,

    /// Tried in order when the primary fails or times out.
    pub failover_urls: Vec<String>,

    /// Per-attempt limit, in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required before a receipt is reported.
    pub confirmation_blocks: u32,

    /// Gas price multiplier applied when filling locally signed transactions.
    pub gas_price_multiplier: f64,

    /// Local sends fail instead of paying more than this many gwei.
    pub max_gas_price_gwei: u64,

    /// Interval for chain head polling and receipt polling, in milliseconds.
    pub poll_interval_ms: u64,
}

impl ChainConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
            poll_interval_ms: 4_000,
        }
    }
}

/// Indexer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// GraphQL endpoint. Indexer queries fail when unset.
    pub url: Option<String>,

    /// How often cached indexer queries re-fetch, in milliseconds.
    pub poll_interval_ms: u64,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            url: None,
            poll_interval_ms: 30_000,
            timeout_secs: 30,
        }
    }
}

/// Content-addressed file store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IpfsConfig {
    /// Gateway base URL; files are fetched from `{gateway_url}/ipfs/{hash}`.
    pub gateway_url: String,

    /// Pinning endpoint. Pinning fails when unset.
    pub pin_url: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            gateway_url: "https://ipfs.io".to_string(),
            pin_url: None,
            timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Expose a Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Listen address of the Prometheus exporter.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SdkConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.observable_cache_time, CacheTime::Millis(60_000));
        assert_eq!(config.cache.value_cache_time.as_duration(), None);
        assert!(config.chains.is_empty());
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_parse_toml() {
        let config = SdkConfig::from_toml_str(
            r#"
            [cache]
            observable_cache_time = "infinite"
            value_cache_time = { millis = 1500 }
            max_entries = 100

            [[chains]]
            chain_id = 11155111
            rpc_url = "https://sepolia.example.org"
            confirmation_blocks = 2

            [indexer]
            url = "https://indexer.example.org/graphql"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.observable_cache_time, CacheTime::Infinite);
        assert_eq!(
            config.cache.value_cache_time.as_duration(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(config.cache.max_entries, Some(100));

        let chain = config.chain(11155111).unwrap();
        assert_eq!(chain.confirmation_blocks, 2);
        assert_eq!(chain.rpc_timeout_secs, 10);
        assert!(config.chain(1).is_none());
    }
}
