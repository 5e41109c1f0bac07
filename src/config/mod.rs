//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or embedding host
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SdkConfig (validated, immutable)
//!     → Sdk::new (cache defaults, chain registry, remote clients)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once an `Sdk` is built
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheConfig, CacheTime, ChainConfig, IndexerConfig, IpfsConfig, ObservabilityConfig,
    SdkConfig,
};
