//! Signer capability and the chain-bound write capability built on it.
//!
//! # Design Decisions
//! - The signer shape is an explicit enum chosen by the caller when it is
//!   attached; nothing inspects the signer per call
//! - External wallets are driven through EIP-1193 style `request` calls
//! - Local credentials sign for whichever chain the request targets, so they
//!   never need a chain switch

use std::sync::Arc;

use alloy::hex;
use alloy::primitives::{Address, TxHash};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::Signature;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::blockchain::client::ChainRpc;
use crate::blockchain::transaction::{GasPolicy, TxBuilder};
use crate::blockchain::wallet::Wallet;
use crate::error::{SdkError, SdkResult};

/// A request-based wallet provider (browser extension, WalletConnect bridge, ...).
#[async_trait]
pub trait ExternalProvider: Send + Sync {
    /// Perform a JSON-RPC style request such as `eth_accounts`.
    async fn request(&self, method: &str, params: Value) -> Result<Value, String>;
}

/// The signer attached to an SDK instance.
#[derive(Clone)]
pub enum Signer {
    /// Directly-signing local credential.
    Local(Wallet),
    /// Request-based external wallet provider.
    External(Arc<dyn ExternalProvider>),
}

impl From<Wallet> for Signer {
    fn from(wallet: Wallet) -> Self {
        Signer::Local(wallet)
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signer::Local(wallet) => f.debug_tuple("Local").field(&wallet.address()).finish(),
            Signer::External(_) => f.write_str("External"),
        }
    }
}

impl Signer {
    /// Wrap an external provider.
    pub fn external(provider: impl ExternalProvider + 'static) -> Self {
        Signer::External(Arc::new(provider))
    }

    /// Addresses the signer can sign for.
    pub async fn addresses(&self) -> SdkResult<Vec<Address>> {
        match self {
            Signer::Local(wallet) => Ok(vec![wallet.address()]),
            Signer::External(provider) => {
                let value = request(provider.as_ref(), "eth_accounts", json!([])).await?;
                serde_json::from_value(value)
                    .map_err(|e| SdkError::Signer(format!("Malformed eth_accounts response: {}", e)))
            }
        }
    }

    /// The first available address.
    pub async fn address(&self) -> SdkResult<Address> {
        self.addresses()
            .await?
            .into_iter()
            .next()
            .ok_or(SdkError::NoAccountSelected)
    }

    /// The chain currently selected by the signer, if it has one.
    pub async fn chain_id(&self) -> SdkResult<Option<u64>> {
        match self {
            Signer::Local(_) => Ok(None),
            Signer::External(provider) => {
                let value = request(provider.as_ref(), "eth_chainId", json!([])).await?;
                parse_quantity(&value).map(Some)
            }
        }
    }

    /// Ask the signer to select `chain_id`.
    pub async fn switch_chain(&self, chain_id: u64) -> SdkResult<()> {
        match self {
            Signer::Local(_) => Ok(()),
            Signer::External(provider) => provider
                .request(
                    "wallet_switchEthereumChain",
                    json!([{ "chainId": format!("0x{:x}", chain_id) }]),
                )
                .await
                .map(|_| ())
                .map_err(|reason| SdkError::ChainSwitchFailed { chain_id, reason }),
        }
    }

    /// Sign a message with the Ethereum prefix.
    pub async fn sign_message(&self, address: Address, message: &[u8]) -> SdkResult<Signature> {
        match self {
            Signer::Local(wallet) => Ok(wallet.sign_message(message).await?),
            Signer::External(provider) => {
                let value = request(
                    provider.as_ref(),
                    "personal_sign",
                    json!([hex::encode_prefixed(message), address]),
                )
                .await?;
                parse_signature(&value)
            }
        }
    }

    /// Sign and submit a transaction on `chain`.
    pub async fn send_transaction(
        &self,
        chain: &dyn ChainRpc,
        gas: GasPolicy,
        address: Address,
        tx: TransactionRequest,
    ) -> SdkResult<TxHash> {
        match self {
            Signer::Local(wallet) => Ok(TxBuilder::new(chain, wallet, gas).send(tx).await?),
            Signer::External(provider) => {
                let mut tx = tx;
                tx.from = Some(address);
                let params = serde_json::to_value(&tx)
                    .map_err(|e| SdkError::Signer(format!("Unserializable transaction: {}", e)))?;
                let value = request(provider.as_ref(), "eth_sendTransaction", json!([params])).await?;
                serde_json::from_value(value).map_err(|e| {
                    SdkError::Signer(format!("Malformed eth_sendTransaction response: {}", e))
                })
            }
        }
    }
}

async fn request(provider: &dyn ExternalProvider, method: &str, params: Value) -> SdkResult<Value> {
    provider
        .request(method, params)
        .await
        .map_err(|e| SdkError::Signer(format!("{} failed: {}", method, e)))
}

fn parse_quantity(value: &Value) -> SdkResult<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => u64::from_str_radix(s.trim_start_matches("0x"), 16).ok(),
        _ => None,
    }
    .ok_or_else(|| SdkError::Signer(format!("Malformed quantity: {}", value)))
}

fn parse_signature(value: &Value) -> SdkResult<Signature> {
    let raw = value
        .as_str()
        .ok_or_else(|| SdkError::Signer(format!("Malformed signature: {}", value)))?;
    let bytes = hex::decode(raw).map_err(|e| SdkError::Signer(format!("Malformed signature: {}", e)))?;
    Signature::try_from(bytes.as_slice())
        .map_err(|e| SdkError::Signer(format!("Malformed signature: {}", e)))
}

/// Write capability bound to one chain and one signing address.
#[derive(Clone)]
pub struct WalletClient {
    signer: Signer,
    address: Address,
    chain: Arc<dyn ChainRpc>,
    gas: GasPolicy,
}

impl WalletClient {
    pub fn new(signer: Signer, address: Address, chain: Arc<dyn ChainRpc>, gas: GasPolicy) -> Self {
        Self {
            signer,
            address,
            chain,
            gas,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain.chain_id()
    }

    /// The read side of the chain this client writes to.
    pub fn chain(&self) -> &Arc<dyn ChainRpc> {
        &self.chain
    }

    pub async fn sign_message(&self, message: &[u8]) -> SdkResult<Signature> {
        self.signer.sign_message(self.address, message).await
    }

    pub async fn send_transaction(&self, tx: TransactionRequest) -> SdkResult<TxHash> {
        self.signer
            .send_transaction(self.chain.as_ref(), self.gas, self.address, tx)
            .await
    }

    pub async fn wait_for_receipt(&self, tx_hash: TxHash) -> SdkResult<TransactionReceipt> {
        Ok(self.chain.wait_for_receipt(tx_hash).await?)
    }
}
