//! Per-execution transaction context and step helpers.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::Signature;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::blockchain::signer::{Signer, WalletClient};
use crate::error::{SdkError, SdkResult};
use crate::observability::metrics;
use crate::transaction::status::{ContractCall, OperationStatus};

pub(crate) type StatusSender = mpsc::Sender<SdkResult<OperationStatus>>;

/// Push one status to the consumer of an execution.
pub(crate) async fn emit(events: &StatusSender, status: OperationStatus) -> SdkResult<()> {
    tracing::debug!(status = status.kind(), id = ?status.id(), "Transaction status");
    metrics::record_transaction_status(status.kind());
    events.send(Ok(status)).await.map_err(|_| SdkError::Cancelled)
}

/// One step of a declarative step list.
#[derive(Debug, Clone)]
pub enum Step {
    /// Sign a message with the Ethereum prefix.
    SignMessage { title: String, message: Bytes },
    /// Sign and submit a raw request, then wait for its confirmation.
    Send {
        title: String,
        request: TransactionRequest,
    },
    /// A contract call; batchable.
    Call { title: String, call: ContractCall },
}

/// What a step produced.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Signed(Signature),
    Confirmed(TransactionReceipt),
    /// The call was handed to the batch aggregator instead of being sent.
    Batched,
}

/// Everything a step sequence needs for one execution: the target chain,
/// the resolved signing address, a write capability bound to both, and the
/// status channel.
///
/// While batching, calls made through [`TransactionContext::send_call`] are
/// reported as batch data and steps that would sign fail with
/// [`SdkError::BatchNotBatchable`], so nothing is signed or submitted.
pub struct TransactionContext {
    chain_id: u64,
    address: Address,
    wallet: WalletClient,
    signer: Signer,
    batching: bool,
    events: StatusSender,
}

impl TransactionContext {
    pub(crate) fn new(
        chain_id: u64,
        address: Address,
        wallet: WalletClient,
        signer: Signer,
        batching: bool,
        events: StatusSender,
    ) -> Self {
        Self {
            chain_id,
            address,
            wallet,
            signer,
            batching,
            events,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wallet(&self) -> &WalletClient {
        &self.wallet
    }

    /// The signer the execution was started with.
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn is_batching(&self) -> bool {
        self.batching
    }

    /// Forward a custom status.
    pub async fn emit(&self, status: OperationStatus) -> SdkResult<()> {
        emit(&self.events, status).await
    }

    /// Message step: `SigningMessage` then `SignedMessage`, sharing one id.
    pub async fn sign_message(&self, title: &str, message: impl AsRef<[u8]>) -> SdkResult<Signature> {
        self.reject_while_batching()?;
        let id = Uuid::new_v4();

        self.emit(OperationStatus::SigningMessage {
            id,
            title: title.to_string(),
        })
        .await?;

        let signed = self.wallet.sign_message(message.as_ref()).await?;

        self.emit(OperationStatus::SignedMessage {
            id,
            title: title.to_string(),
            signed,
        })
        .await?;
        Ok(signed)
    }

    /// Transaction step: `SigningTransaction`, `TransactionPending`,
    /// `TransactionConfirmed`, sharing one id.
    pub async fn send(&self, title: &str, request: TransactionRequest) -> SdkResult<TransactionReceipt> {
        self.reject_while_batching()?;
        let id = Uuid::new_v4();

        self.emit(OperationStatus::SigningTransaction {
            id,
            title: title.to_string(),
        })
        .await?;

        let hash = self.wallet.send_transaction(request).await?;

        self.emit(OperationStatus::TransactionPending {
            id,
            title: title.to_string(),
            hash,
        })
        .await?;

        let receipt = self.wallet.wait_for_receipt(hash).await?;
        tracing::info!(
            tx_hash = %hash,
            chain_id = self.chain_id,
            block = ?receipt.block_number,
            "Transaction confirmed"
        );

        self.emit(OperationStatus::TransactionConfirmed {
            id,
            title: title.to_string(),
            hash,
            receipt: receipt.clone(),
        })
        .await?;
        Ok(receipt)
    }

    /// Contract call step. Returns `None` when the call was batched.
    pub async fn send_call(&self, title: &str, call: ContractCall) -> SdkResult<Option<TransactionReceipt>> {
        if self.batching {
            self.emit(OperationStatus::BatchTransactionData(call.into_batch_data()))
                .await?;
            return Ok(None);
        }

        let request = TransactionRequest::default()
            .with_to(call.contract)
            .with_input(call.data)
            .with_value(call.value);
        self.send(title, request).await.map(Some)
    }

    /// Run one declarative step.
    pub async fn run(&self, step: Step) -> SdkResult<StepOutcome> {
        match step {
            Step::SignMessage { title, message } => {
                self.sign_message(&title, &message).await.map(StepOutcome::Signed)
            }
            Step::Send { title, request } => {
                self.send(&title, request).await.map(StepOutcome::Confirmed)
            }
            Step::Call { title, call } => Ok(match self.send_call(&title, call).await? {
                Some(receipt) => StepOutcome::Confirmed(receipt),
                None => StepOutcome::Batched,
            }),
        }
    }

    fn reject_while_batching(&self) -> SdkResult<()> {
        if self.batching {
            // The aggregator replaces the index with the transaction's position.
            return Err(SdkError::BatchNotBatchable { index: 0 });
        }
        Ok(())
    }
}
