//! Error taxonomy shared by queries and transactions.
//!
//! Errors are `Clone` because a single producer failure is delivered to every
//! subscriber of the shared stream that observed it.

use alloy::primitives::Address;
use thiserror::Error;

use crate::blockchain::types::BlockchainError;

/// Errors surfaced by queries, transactions and batches.
#[derive(Debug, Clone, Error)]
pub enum SdkError {
    /// A transaction was requested while no signer is attached.
    #[error("No signer attached")]
    NoSigner,

    /// The signer reported zero addresses.
    #[error("Signer has no account selected")]
    NoAccountSelected,

    /// The signer refused or failed to switch to the requested chain.
    #[error("Failed to switch signer to chain {chain_id}: {reason}")]
    ChainSwitchFailed { chain_id: u64, reason: String },

    /// Batched transactions target more than one chain.
    #[error("Batched transactions target different chains: expected {expected}, got {actual}")]
    BatchChainMismatch { expected: u64, actual: u64 },

    /// Batched transactions target more than one contract.
    #[error("Batched transactions target different contracts: expected {expected}, got {actual}")]
    BatchContractMismatch { expected: Address, actual: Address },

    /// A batched transaction did not produce batchable call data.
    #[error("Transaction at batch index {index} is not batchable")]
    BatchNotBatchable { index: usize },

    /// A batch was requested with no transactions.
    #[error("Cannot batch an empty list of transactions")]
    EmptyBatch,

    /// No chain capability is registered for the chain id.
    #[error("Chain {0} is not configured")]
    UnknownChain(u64),

    /// A producer finished without emitting anything.
    #[error("Producer completed without a value")]
    NoValue,

    /// The consumer of a transaction went away mid-sequence.
    #[error("Transaction stream was dropped")]
    Cancelled,

    /// Signing or provider round-trip failure.
    #[error("Signer error: {0}")]
    Signer(String),

    /// Chain read/write failure.
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),

    /// Indexer or content store failure.
    #[error("Remote fetch failed: {0}")]
    Remote(String),

    /// Any other failure raised by a query's or step's underlying work.
    #[error("{0}")]
    Producer(String),
}

impl SdkError {
    /// Wrap an arbitrary failure raised by producer work.
    pub fn producer(err: impl std::fmt::Display) -> Self {
        Self::Producer(err.to_string())
    }

    /// Whether this error came from the underlying work rather than from
    /// validation performed by the core itself.
    pub fn is_producer_error(&self) -> bool {
        matches!(
            self,
            Self::Signer(_) | Self::Blockchain(_) | Self::Remote(_) | Self::Producer(_)
        )
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote(err.to_string())
    }
}

/// Result type for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;
