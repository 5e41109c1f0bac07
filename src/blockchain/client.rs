//! Chain read/write capability.
//!
//! # Responsibilities
//! - Define the `ChainRpc` capability the core consumes per chain id
//! - Connect to JSON-RPC endpoints with failover
//! - Query chain state (block number, balances, receipts, contract reads)
//! - Broadcast signed transactions and wait for confirmation

use std::future::Future;
use std::time::Duration;

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use tokio::time::{interval, timeout};

use crate::blockchain::types::{BlockchainError, BlockchainResult, ChainConfig};

/// Read/write access to one chain.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// The chain this capability is bound to.
    fn chain_id(&self) -> u64;

    /// Confirmations required before `wait_for_receipt` resolves.
    fn confirmation_blocks(&self) -> u32 {
        1
    }

    /// Receipt polling interval.
    fn poll_interval(&self) -> Duration {
        Duration::from_secs(4)
    }

    async fn block_number(&self) -> BlockchainResult<u64>;

    async fn balance(&self, address: Address) -> BlockchainResult<U256>;

    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64>;

    /// Current gas price in wei.
    async fn gas_price(&self) -> BlockchainResult<u128>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> BlockchainResult<u64>;

    /// Execute a read-only contract call.
    async fn call(&self, tx: &TransactionRequest) -> BlockchainResult<Bytes>;

    /// Broadcast an EIP-2718 encoded signed transaction.
    async fn send_raw_transaction(&self, encoded: &[u8]) -> BlockchainResult<TxHash>;

    async fn transaction_receipt(&self, tx_hash: TxHash)
        -> BlockchainResult<Option<TransactionReceipt>>;

    /// Poll until the transaction is mined with enough confirmations.
    ///
    /// There is no deadline; callers impose their own.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> BlockchainResult<TransactionReceipt> {
        let required = u64::from(self.confirmation_blocks());
        let mut ticker = interval(self.poll_interval());

        loop {
            ticker.tick().await;

            let receipt = match self.transaction_receipt(tx_hash).await? {
                Some(r) => r,
                None => {
                    tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                    continue;
                }
            };

            if !receipt.status() {
                return Err(BlockchainError::Reverted(tx_hash.to_string()));
            }

            let current_block = self.block_number().await?;
            let tx_block = receipt.block_number.unwrap_or(current_block);
            let confirmations = current_block.saturating_sub(tx_block) + 1;

            if confirmations >= required {
                return Ok(receipt);
            }

            tracing::debug!(
                tx_hash = %tx_hash,
                confirmations = confirmations,
                required = required,
                "Waiting for confirmations"
            );
        }
    }
}

/// JSON-RPC chain client with failover support.
#[derive(Clone)]
pub struct BlockchainClient {
    /// Primary first, then failovers in configured order.
    providers: Vec<DynProvider>,
    config: ChainConfig,
    /// Applied to each provider attempt.
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a new client. No network traffic happens until the first call.
    pub fn new(config: ChainConfig) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(ProviderBuilder::new().connect_http(primary_url).erased());

        // Failovers are best effort; a bad URL only loses that endpoint.
        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse::<url::Url>() {
                providers.push(ProviderBuilder::new().connect_http(url).erased());
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id = config.chain_id,
            failovers = providers.len() - 1,
            "Chain client initialized"
        );

        Ok(Self {
            providers,
            config,
            timeout_duration,
        })
    }

    /// Ask the endpoint which chain it serves and compare with the configured id.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let actual = self
            .with_failover("eth_chainId", |p| async move { p.get_chain_id().await })
            .await?;
        if actual != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Run `op` against each provider in turn until one answers in time.
    async fn with_failover<T, E, F, Fut>(&self, method: &'static str, op: F) -> BlockchainResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut timeouts = 0;
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, op(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    timeouts += 1;
                    tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider");
                }
            }
        }
        if timeouts == self.providers.len() {
            return Err(BlockchainError::Timeout(self.config.rpc_timeout_secs));
        }
        Err(BlockchainError::Rpc(format!("All RPC providers failed: {}", method)))
    }
}

#[async_trait]
impl ChainRpc for BlockchainClient {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    fn confirmation_blocks(&self) -> u32 {
        self.config.confirmation_blocks
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval()
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.with_failover("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.with_failover("eth_getBalance", |p| async move { p.get_balance(address).await })
            .await
    }

    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64> {
        self.with_failover("eth_getTransactionCount", |p| async move {
            p.get_transaction_count(address).await
        })
        .await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.with_failover("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> BlockchainResult<u64> {
        self.with_failover("eth_estimateGas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    async fn call(&self, tx: &TransactionRequest) -> BlockchainResult<Bytes> {
        self.with_failover("eth_call", |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    async fn send_raw_transaction(&self, encoded: &[u8]) -> BlockchainResult<TxHash> {
        self.with_failover("eth_sendRawTransaction", |p| async move {
            p.send_raw_transaction(encoded).await.map(|pending| *pending.tx_hash())
        })
        .await
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<Option<TransactionReceipt>> {
        self.with_failover("eth_getTransactionReceipt", |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
