//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! SdkConfig.chains
//!     → registry.rs (chain id → ChainRpc capability)
//!     → client.rs (JSON-RPC with timeouts and failover)
//!
//! Attached signer (signer.rs: Local wallet | External provider)
//!     + ChainRpc for the target chain
//!     → WalletClient (chain-and-account-bound write capability)
//!     → transaction.rs (fill, sign, broadcast for local wallets)
//! ```
//!
//! # Security Constraints
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod registry;
pub mod signer;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{BlockchainClient, ChainRpc};
pub use registry::ChainRegistry;
pub use signer::{ExternalProvider, Signer, WalletClient};
pub use transaction::GasPolicy;
pub use types::{BlockchainError, BlockchainResult};
pub use wallet::Wallet;
