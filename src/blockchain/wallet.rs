//! Local credential signer.
//!
//! # Security
//! - The key never leaves the `PrivateKeySigner`; only the derived address
//!   appears in log fields

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, Signer};

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// A directly-signing local credential.
///
/// Not bound to a chain: the transaction request carries the chain id.
#[derive(Debug, Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Parse a hex private key, `0x` prefix optional.
    pub fn from_private_key(key: &str) -> BlockchainResult<Self> {
        let signer = key
            .trim()
            .trim_start_matches("0x")
            .parse::<PrivateKeySigner>()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key: {}", e)))?;

        tracing::info!(address = %signer.address(), "Local wallet loaded");
        Ok(Self { signer })
    }

    /// Throwaway credential.
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// EIP-191 personal message signature.
    pub async fn sign_message(&self, message: &[u8]) -> BlockchainResult<Signature> {
        self.signer
            .sign_message(message)
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Message signing failed: {}", e)))
    }

    /// Network wallet used to sign filled transaction requests.
    pub fn ethereum_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}
