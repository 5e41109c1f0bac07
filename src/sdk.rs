//! SDK instance wiring the query cache, chains, signer and transactions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::blockchain::{ChainRegistry, ChainRpc, Signer};
use crate::config::{CacheTime, SdkConfig};
use crate::error::{SdkError, SdkResult};
use crate::key;
use crate::query::{poll, Key, Query, QueryCache, QueryOptions, Shareable};
use crate::remote::{IndexerClient, IpfsClient};
use crate::transaction::{Step, Transaction, TransactionContext, TransactionEngine};

struct SdkInner {
    config: SdkConfig,
    cache: QueryCache,
    engine: TransactionEngine,
    indexer: Option<IndexerClient>,
    ipfs: IpfsClient,
}

/// Entry point for reads and writes against the protocol.
///
/// Cheap to clone; clones share one cache, chain registry and signer slot.
#[derive(Clone)]
pub struct Sdk {
    inner: Arc<SdkInner>,
}

impl Sdk {
    /// Build an instance. The configuration is used as-is; see
    /// [`crate::config::validation::validate_config`].
    pub fn new(config: SdkConfig) -> SdkResult<Self> {
        let chains = ChainRegistry::from_configs(&config.chains)?;
        let indexer = IndexerClient::from_config(&config.indexer)?;
        let ipfs = IpfsClient::new(&config.ipfs)?;

        tracing::info!(
            chains = ?chains.chain_ids(),
            cache_enabled = config.cache.enabled,
            indexer = indexer.is_some(),
            "SDK initialized"
        );

        Ok(Self {
            inner: Arc::new(SdkInner {
                cache: QueryCache::new(config.cache.clone()),
                engine: TransactionEngine::new(chains),
                indexer,
                ipfs,
                config,
            }),
        })
    }

    pub fn config(&self) -> &SdkConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.inner.engine
    }

    // ---- signer and chains ----

    pub fn set_signer(&self, signer: impl Into<Signer>) {
        self.inner.engine.set_signer(Some(signer.into()));
    }

    pub fn clear_signer(&self) {
        self.inner.engine.set_signer(None);
    }

    pub fn signer(&self) -> Option<Signer> {
        self.inner.engine.signer()
    }

    /// Register or replace the capability for a chain.
    pub fn register_chain(&self, rpc: Arc<dyn ChainRpc>) {
        self.inner.engine.chains().register(rpc);
    }

    pub fn chain(&self, chain_id: u64) -> SdkResult<Arc<dyn ChainRpc>> {
        self.inner.engine.chains().get(chain_id)
    }

    // ---- queries ----

    /// Cached query with the instance defaults.
    pub fn query<T, F, S>(&self, key: Key, factory: F) -> Query<T>
    where
        T: Shareable,
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = SdkResult<T>> + Send + 'static,
    {
        self.inner.cache.query(Some(key), factory, QueryOptions::new())
    }

    /// Query with an optional key and per-query options.
    pub fn query_with<T, F, S>(&self, key: Option<Key>, factory: F, options: QueryOptions) -> Query<T>
    where
        T: Shareable,
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = SdkResult<T>> + Send + 'static,
    {
        self.inner.cache.query(key, factory, options)
    }

    pub fn query_future<T, F, Fut>(&self, key: Option<Key>, f: F, options: QueryOptions) -> Query<T>
    where
        T: Shareable,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SdkResult<T>> + Send + 'static,
    {
        self.inner.cache.query_future(key, f, options)
    }

    /// Chain head, polled at the chain's poll interval.
    pub fn block_number(&self, chain_id: u64) -> Query<u64> {
        let chains = self.inner.engine.chains().clone();
        self.query(key!["blockNumber", chain_id], move || {
            match chains.get(chain_id) {
                Ok(rpc) => poll(rpc.poll_interval(), move || {
                    let rpc = rpc.clone();
                    async move { Ok::<_, SdkError>(rpc.block_number().await?) }
                })
                .boxed(),
                Err(err) => stream::once(future::ready(Err(err))).boxed(),
            }
        })
    }

    pub fn balance(&self, chain_id: u64, address: Address) -> Query<U256> {
        let chains = self.inner.engine.chains().clone();
        self.query_future(
            Some(key!["balance", chain_id, address]),
            move || {
                let chains = chains.clone();
                async move { Ok::<_, SdkError>(chains.get(chain_id)?.balance(address).await?) }
            },
            QueryOptions::new(),
        )
    }

    /// `eth_call` against `to` with raw calldata.
    pub fn read_contract(&self, chain_id: u64, to: Address, calldata: Bytes) -> Query<Bytes> {
        let chains = self.inner.engine.chains().clone();
        let key = key!["readContract", chain_id, to, calldata];
        self.query_future(
            Some(key),
            move || {
                let chains = chains.clone();
                let request = TransactionRequest::default()
                    .with_to(to)
                    .with_input(calldata.clone());
                async move { Ok::<_, SdkError>(chains.get(chain_id)?.call(&request).await?) }
            },
            QueryOptions::new(),
        )
    }

    /// GraphQL query, cached by query text and variables and re-fetched at
    /// the configured indexer poll interval.
    pub fn indexer_query<T>(&self, query: &str, variables: Value) -> Query<T>
    where
        T: DeserializeOwned + Clone + PartialEq + Send + 'static,
    {
        let indexer = self.inner.indexer.clone();
        let interval = Duration::from_millis(self.inner.config.indexer.poll_interval_ms);
        let key = key!["indexer", query, variables];
        let query = query.to_string();

        self.query(key, move || match indexer.clone() {
            Some(indexer) => {
                let query = query.clone();
                let variables = variables.clone();
                poll(interval, move || {
                    let indexer = indexer.clone();
                    let query = query.clone();
                    let variables = variables.clone();
                    async move { indexer.fetch::<T>(&query, variables).await }
                })
                .boxed()
            }
            None => stream::once(future::ready(Err(SdkError::Remote(
                "No indexer configured".to_string(),
            ))))
            .boxed(),
        })
    }

    /// A content-addressed JSON document. Kept for the life of the instance.
    pub fn ipfs_json<T>(&self, hash: &str) -> Query<T>
    where
        T: DeserializeOwned + Shareable,
    {
        let ipfs = self.inner.ipfs.clone();
        let hash = hash.to_string();
        self.query_future(
            Some(key!["ipfs", hash]),
            move || {
                let ipfs = ipfs.clone();
                let hash = hash.clone();
                async move { ipfs.fetch_json::<T>(&hash).await }
            },
            QueryOptions::new()
                .observable_cache_time(CacheTime::Infinite)
                .value_cache_time(CacheTime::Infinite),
        )
    }

    pub async fn pin_json<T: Serialize + ?Sized>(&self, value: &T) -> SdkResult<String> {
        self.inner.ipfs.pin_json(value).await
    }

    // ---- transactions ----

    /// A lazy transaction running `callback` against `chain_id`.
    pub fn transact<F, Fut>(&self, chain_id: u64, callback: F) -> Transaction
    where
        F: Fn(TransactionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SdkResult<()>> + Send + 'static,
    {
        self.inner.engine.transact(chain_id, callback)
    }

    pub fn transact_steps(&self, chain_id: u64, steps: Vec<Step>) -> Transaction {
        self.inner.engine.transact_steps(chain_id, steps)
    }

    /// Combine same-chain, same-contract transactions into one multicall.
    pub fn batch(&self, title: impl Into<String>, transactions: Vec<Transaction>) -> SdkResult<Transaction> {
        self.inner.engine.batch(title, transactions)
    }
}

impl std::fmt::Debug for Sdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sdk")
            .field("chains", &self.inner.engine.chains().chain_ids())
            .field("cached_queries", &self.inner.cache.len())
            .field("signer", &self.signer())
            .finish()
    }
}
