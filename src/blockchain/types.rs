//! Chain error type.

use thiserror::Error;

pub use crate::config::schema::ChainConfig;

/// Failure while reading from or writing to a chain.
#[derive(Debug, Clone, Error)]
pub enum BlockchainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Every endpoint exceeded `rpc_timeout_secs`.
    #[error("RPC request exceeded {0}s")]
    Timeout(u64),

    /// Receipt status was failure; carries the hash.
    #[error("Transaction {0} reverted")]
    Reverted(String),

    /// Key parsing or local signing.
    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Gas price {current_gwei} gwei is above the {max_gwei} gwei cap")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Filling, signing or encoding a request.
    #[error("Cannot build transaction: {0}")]
    Build(String),

    /// The endpoint reports a different chain than the one registered.
    #[error("Endpoint serves chain {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },
}

pub type BlockchainResult<T> = Result<T, BlockchainError>;
