//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use protocol_sdk::blockchain::{BlockchainResult, ChainRpc, ExternalProvider};

/// Signature returned by the mock provider for every `personal_sign`.
pub fn mock_signature_hex() -> String {
    format!("0x{}{}1b", "11".repeat(32), "22".repeat(32))
}

/// A request-based wallet that records every call it receives.
pub struct MockProvider {
    pub accounts: Vec<Address>,
    chain_id: AtomicU64,
    reject_switch: AtomicBool,
    next_hash: AtomicU64,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MockProvider {
    pub fn new(chain_id: u64) -> Arc<Self> {
        Self::with_accounts(chain_id, vec![Address::repeat_byte(0x42)])
    }

    pub fn with_accounts(chain_id: u64, accounts: Vec<Address>) -> Arc<Self> {
        Arc::new(Self {
            accounts,
            chain_id: AtomicU64::new(chain_id),
            reject_switch: AtomicBool::new(false),
            next_hash: AtomicU64::new(1),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn reject_switch(&self) {
        self.reject_switch.store(true, Ordering::SeqCst);
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id.load(Ordering::SeqCst)
    }

    /// Method names in call order.
    pub fn methods(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Params of every call to `method`.
    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl ExternalProvider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, String> {
        self.requests.lock().push((method.to_string(), params.clone()));

        match method {
            "eth_accounts" => Ok(json!(self.accounts)),
            "eth_chainId" => Ok(json!(format!("0x{:x}", self.chain_id()))),
            "wallet_switchEthereumChain" => {
                if self.reject_switch.load(Ordering::SeqCst) {
                    return Err("User rejected the request".to_string());
                }
                let requested = params[0]["chainId"]
                    .as_str()
                    .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
                    .ok_or("bad chainId")?;
                self.chain_id.store(requested, Ordering::SeqCst);
                Ok(Value::Null)
            }
            "personal_sign" => Ok(json!(mock_signature_hex())),
            "eth_sendTransaction" => {
                let n = self.next_hash.fetch_add(1, Ordering::SeqCst);
                Ok(json!(TxHash::with_last_byte(n as u8)))
            }
            other => Err(format!("Unsupported method {}", other)),
        }
    }
}

/// In-memory chain capability.
pub struct MockChain {
    chain_id: u64,
    block: AtomicU64,
    pub balance: U256,
    pub call_result: Bytes,
    next_hash: AtomicU64,
    raw_transactions: Mutex<Vec<Vec<u8>>>,
    block_reads: AtomicU64,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            block: AtomicU64::new(100),
            balance: U256::from(1_000_000u64),
            call_result: Bytes::from_static(&[0xca, 0xfe]),
            next_hash: AtomicU64::new(0x80),
            raw_transactions: Mutex::new(Vec::new()),
            block_reads: AtomicU64::new(0),
        })
    }

    pub fn set_block(&self, block: u64) {
        self.block.store(block, Ordering::SeqCst);
    }

    pub fn block_reads(&self) -> u64 {
        self.block_reads.load(Ordering::SeqCst)
    }

    pub fn raw_transactions(&self) -> Vec<Vec<u8>> {
        self.raw_transactions.lock().clone()
    }

    fn receipt(&self, hash: TxHash) -> TransactionReceipt {
        let receipt = json!({
            "type": "0x0",
            "status": "0x1",
            "cumulativeGasUsed": "0x5208",
            "logs": [],
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "transactionHash": hash,
            "transactionIndex": "0x0",
            "blockHash": TxHash::repeat_byte(0xbb),
            "blockNumber": format!("0x{:x}", self.block.load(Ordering::SeqCst)),
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": Address::repeat_byte(0x42),
            "to": Address::repeat_byte(0xaa),
            "contractAddress": null
        });
        serde_json::from_value(receipt).expect("valid receipt json")
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(10)
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.block_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.block.load(Ordering::SeqCst))
    }

    async fn balance(&self, _address: Address) -> BlockchainResult<U256> {
        Ok(self.balance)
    }

    async fn transaction_count(&self, _address: Address) -> BlockchainResult<u64> {
        Ok(0)
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        Ok(1_000_000_000)
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> BlockchainResult<u64> {
        Ok(21_000)
    }

    async fn call(&self, _tx: &TransactionRequest) -> BlockchainResult<Bytes> {
        Ok(self.call_result.clone())
    }

    async fn send_raw_transaction(&self, encoded: &[u8]) -> BlockchainResult<TxHash> {
        self.raw_transactions.lock().push(encoded.to_vec());
        let n = self.next_hash.fetch_add(1, Ordering::SeqCst);
        Ok(TxHash::with_last_byte(n as u8))
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<TransactionReceipt>> {
        Ok(Some(self.receipt(tx_hash)))
    }
}

/// A request seen by the programmable backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// `f` receives each request and returns `(status, body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let (read_half, mut write_half) = socket.into_split();
                        let mut reader = BufReader::new(read_half);

                        let mut request_line = String::new();
                        if reader.read_line(&mut request_line).await.is_err() {
                            return;
                        }
                        let mut parts = request_line.split_whitespace();
                        let method = parts.next().unwrap_or_default().to_string();
                        let path = parts.next().unwrap_or_default().to_string();

                        let mut content_length = 0usize;
                        loop {
                            let mut line = String::new();
                            match reader.read_line(&mut line).await {
                                Ok(0) | Err(_) => break,
                                Ok(_) => {}
                            }
                            let line = line.trim_end();
                            if line.is_empty() {
                                break;
                            }
                            if let Some((name, value)) = line.split_once(':') {
                                if name.eq_ignore_ascii_case("content-length") {
                                    content_length = value.trim().parse().unwrap_or(0);
                                }
                            }
                        }

                        let mut body = vec![0u8; content_length];
                        let _ = reader.read_exact(&mut body).await;

                        let (status, body) = f(RecordedRequest {
                            method,
                            path,
                            body: String::from_utf8_lossy(&body).into_owned(),
                        })
                        .await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = write_half.write_all(response.as_bytes()).await;
                        let _ = write_half.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
