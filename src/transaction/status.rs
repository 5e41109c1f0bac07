//! Operation statuses and batch call data.

use std::collections::BTreeMap;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionReceipt;
use alloy::signers::Signature;
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SdkError, SdkResult};

sol! {
    function multicall(bytes[] data) external payable returns (bytes[] results);
}

/// Progress of a transaction execution.
///
/// Statuses of one logical operation share the `id` allocated when the
/// operation begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum OperationStatus {
    SwitchingChain {
        chain_id: u64,
    },
    SigningMessage {
        id: Uuid,
        title: String,
    },
    SignedMessage {
        id: Uuid,
        title: String,
        signed: Signature,
    },
    SigningTransaction {
        id: Uuid,
        title: String,
    },
    TransactionPending {
        id: Uuid,
        title: String,
        hash: TxHash,
    },
    TransactionConfirmed {
        id: Uuid,
        title: String,
        hash: TxHash,
        receipt: TransactionReceipt,
    },
    /// Call data produced instead of a submission while batching.
    BatchTransactionData(BatchTransactionData),
}

impl OperationStatus {
    /// Correlation id, for statuses that belong to a step.
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::SigningMessage { id, .. }
            | Self::SignedMessage { id, .. }
            | Self::SigningTransaction { id, .. }
            | Self::TransactionPending { id, .. }
            | Self::TransactionConfirmed { id, .. } => Some(*id),
            Self::SwitchingChain { .. } | Self::BatchTransactionData(_) => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::SigningMessage { title, .. }
            | Self::SignedMessage { title, .. }
            | Self::SigningTransaction { title, .. }
            | Self::TransactionPending { title, .. }
            | Self::TransactionConfirmed { title, .. } => Some(title),
            Self::SwitchingChain { .. } | Self::BatchTransactionData(_) => None,
        }
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SwitchingChain { .. } => "SwitchingChain",
            Self::SigningMessage { .. } => "SigningMessage",
            Self::SignedMessage { .. } => "SignedMessage",
            Self::SigningTransaction { .. } => "SigningTransaction",
            Self::TransactionPending { .. } => "TransactionPending",
            Self::TransactionConfirmed { .. } => "TransactionConfirmed",
            Self::BatchTransactionData(_) => "BatchTransactionData",
        }
    }
}

/// Encoded calls against one contract, waiting to be combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTransactionData {
    pub contract: Address,
    pub data: Vec<Bytes>,
    pub value: U256,
    /// Destination chain id → message types the calls will send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<BTreeMap<u64, Vec<String>>>,
}

impl BatchTransactionData {
    /// Combine in input order. Every item must target the same contract.
    pub fn merge(items: Vec<BatchTransactionData>) -> SdkResult<BatchTransactionData> {
        let mut items = items.into_iter();
        let mut merged = items.next().ok_or(SdkError::EmptyBatch)?;

        for item in items {
            if item.contract != merged.contract {
                return Err(SdkError::BatchContractMismatch {
                    expected: merged.contract,
                    actual: item.contract,
                });
            }
            merged.data.extend(item.data);
            merged.value = merged.value.saturating_add(item.value);
            if let Some(messages) = item.messages {
                let target = merged.messages.get_or_insert_with(BTreeMap::new);
                for (chain_id, kinds) in messages {
                    target.entry(chain_id).or_default().extend(kinds);
                }
            }
        }

        Ok(merged)
    }

    /// The single call to the contract's combined-call entry point.
    pub fn into_multicall(self) -> ContractCall {
        let input = multicallCall { data: self.data }.abi_encode();
        ContractCall {
            contract: self.contract,
            data: input.into(),
            value: self.value,
            messages: self.messages,
        }
    }
}

/// One encoded contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub contract: Address,
    pub data: Bytes,
    pub value: U256,
    pub messages: Option<BTreeMap<u64, Vec<String>>>,
}

impl ContractCall {
    pub fn new(contract: Address, data: impl Into<Bytes>) -> Self {
        Self {
            contract,
            data: data.into(),
            value: U256::ZERO,
            messages: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Annotate the call with a message type sent to `chain_id`.
    pub fn with_message(mut self, chain_id: u64, kind: impl Into<String>) -> Self {
        self.messages
            .get_or_insert_with(BTreeMap::new)
            .entry(chain_id)
            .or_default()
            .push(kind.into());
        self
    }

    /// The call as batch data, one payload long.
    pub fn into_batch_data(self) -> BatchTransactionData {
        BatchTransactionData {
            contract: self.contract,
            data: vec![self.data],
            value: self.value,
            messages: self.messages,
        }
    }
}
