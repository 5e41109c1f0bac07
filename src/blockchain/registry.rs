//! Chain id → chain capability lookup.

use std::sync::Arc;

use dashmap::DashMap;

use crate::blockchain::client::{BlockchainClient, ChainRpc};
use crate::blockchain::transaction::GasPolicy;
use crate::blockchain::types::{BlockchainResult, ChainConfig};
use crate::error::{SdkError, SdkResult};

struct ChainEntry {
    rpc: Arc<dyn ChainRpc>,
    gas: GasPolicy,
}

/// Registry of chain capabilities shared by queries and transactions.
#[derive(Clone, Default)]
pub struct ChainRegistry {
    chains: Arc<DashMap<u64, ChainEntry>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build JSON-RPC clients for every configured chain.
    pub fn from_configs(configs: &[ChainConfig]) -> BlockchainResult<Self> {
        let registry = Self::new();
        for config in configs {
            let gas = GasPolicy {
                multiplier: config.gas_price_multiplier,
                max_gwei: config.max_gas_price_gwei,
            };
            registry.register_with_gas(Arc::new(BlockchainClient::new(config.clone())?), gas);
        }
        Ok(registry)
    }

    /// Register (or replace) the capability for its chain id.
    pub fn register(&self, rpc: Arc<dyn ChainRpc>) {
        self.register_with_gas(rpc, GasPolicy::default());
    }

    pub fn register_with_gas(&self, rpc: Arc<dyn ChainRpc>, gas: GasPolicy) {
        let chain_id = rpc.chain_id();
        if self.chains.insert(chain_id, ChainEntry { rpc, gas }).is_some() {
            tracing::info!(chain_id, "Replaced chain capability");
        }
    }

    pub fn get(&self, chain_id: u64) -> SdkResult<Arc<dyn ChainRpc>> {
        self.chains
            .get(&chain_id)
            .map(|entry| entry.rpc.clone())
            .ok_or(SdkError::UnknownChain(chain_id))
    }

    pub fn gas_policy(&self, chain_id: u64) -> GasPolicy {
        self.chains
            .get(&chain_id)
            .map(|entry| entry.gas)
            .unwrap_or_default()
    }

    /// Registered chain ids, ascending.
    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.iter().map(|r| *r.key()).collect();
        ids.sort_unstable();
        ids
    }
}
