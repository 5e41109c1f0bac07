//! Filling and signing transactions for local credentials.
//!
//! # Responsibilities
//! - Complete a partial request (nonce, gas price, gas limit, chain id)
//! - Enforce the configured gas price ceiling
//! - Sign and broadcast through the chain capability
//!
//! External wallet providers fill their own transactions; this path is only
//! taken for `Signer::Local`.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::TxHash;
use alloy::rpc::types::TransactionRequest;

use crate::blockchain::client::ChainRpc;
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::wallet::Wallet;

/// Gas price policy applied while filling a request.
#[derive(Debug, Clone, Copy)]
pub struct GasPolicy {
    /// Multiplier on the node's gas price for a safety margin.
    pub multiplier: f64,
    /// Ceiling in gwei.
    pub max_gwei: u64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            multiplier: 1.2,
            max_gwei: 500,
        }
    }
}

/// Transaction builder bound to one chain and one local wallet.
pub struct TxBuilder<'a> {
    chain: &'a dyn ChainRpc,
    wallet: &'a Wallet,
    gas: GasPolicy,
}

impl<'a> TxBuilder<'a> {
    pub fn new(chain: &'a dyn ChainRpc, wallet: &'a Wallet, gas: GasPolicy) -> Self {
        Self { chain, wallet, gas }
    }

    /// Fill every field the node would otherwise choose.
    pub async fn fill(&self, request: TransactionRequest) -> BlockchainResult<TransactionRequest> {
        let from = self.wallet.address();
        let mut tx = request.with_from(from).with_chain_id(self.chain.chain_id());

        if tx.nonce.is_none() {
            let nonce = self.chain.transaction_count(from).await?;
            tx = tx.with_nonce(nonce);
        }

        if tx.gas_price.is_none() && tx.max_fee_per_gas.is_none() {
            let gas_price = self.chain.gas_price().await?;
            let gas_price_gwei = gas_price / 1_000_000_000;
            if gas_price_gwei > u128::from(self.gas.max_gwei) {
                return Err(BlockchainError::GasPriceTooHigh {
                    current_gwei: gas_price_gwei as u64,
                    max_gwei: self.gas.max_gwei,
                });
            }
            // Apply multiplier for safety margin
            let adjusted = (gas_price as f64 * self.gas.multiplier) as u128;
            tx = tx.with_gas_price(adjusted);
        }

        if tx.gas.is_none() {
            let gas_limit = self.chain.estimate_gas(&tx).await?;
            tx = tx.with_gas_limit(gas_limit);
        }

        Ok(tx)
    }

    /// Fill, sign and broadcast. Returns the submission hash.
    pub async fn send(&self, request: TransactionRequest) -> BlockchainResult<TxHash> {
        let tx = self.fill(request).await?;
        let envelope = tx
            .build(&self.wallet.ethereum_wallet())
            .await
            .map_err(|e| BlockchainError::Build(e.to_string()))?;

        let hash = self
            .chain
            .send_raw_transaction(&envelope.encoded_2718())
            .await?;

        tracing::debug!(
            tx_hash = %hash,
            chain_id = self.chain.chain_id(),
            from = %self.wallet.address(),
            "Transaction broadcast"
        );
        Ok(hash)
    }
}
