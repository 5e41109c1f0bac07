//! Batch aggregation of same-chain, same-contract transactions.

use std::sync::Arc;

use futures_util::future::try_join_all;
use futures_util::{FutureExt, StreamExt};

use crate::error::{SdkError, SdkResult};
use crate::transaction::context::TransactionContext;
use crate::transaction::engine::{Sequence, Transaction, TransactionEngine};
use crate::transaction::status::{BatchTransactionData, OperationStatus};

impl TransactionEngine {
    /// Combine `transactions` into one multicall transaction titled `title`.
    ///
    /// Mixed chains are rejected here. Non-batchable steps and mixed
    /// contracts fail the returned transaction before the signer is asked to
    /// switch chains or sign anything.
    pub fn batch(&self, title: impl Into<String>, transactions: Vec<Transaction>) -> SdkResult<Transaction> {
        let chain_id = transactions.first().ok_or(SdkError::EmptyBatch)?.chain_id();
        if let Some(other) = transactions.iter().find(|tx| tx.chain_id() != chain_id) {
            return Err(SdkError::BatchChainMismatch {
                expected: chain_id,
                actual: other.chain_id(),
            });
        }

        for tx in &transactions {
            tx.mark_batched();
        }

        let title = title.into();
        let transactions = Arc::new(transactions);
        tracing::debug!(chain_id, count = transactions.len(), title = %title, "Batch created");

        // Inputs are collected and merged before the batch touches the signer.
        Ok(self.transact_prepared(chain_id, move || {
            let transactions = transactions.clone();
            let title = title.clone();
            async move {
                let call = BatchTransactionData::merge(collect(&transactions).await?)?.into_multicall();
                let sequence: Sequence = Arc::new(move |ctx: TransactionContext| {
                    let title = title.clone();
                    let call = call.clone();
                    async move { ctx.send_call(&title, call).await.map(|_| ()) }.boxed()
                });
                Ok::<_, SdkError>(sequence)
            }
        }))
    }
}

/// First batch data of every transaction, in input order.
async fn collect(transactions: &[Transaction]) -> SdkResult<Vec<BatchTransactionData>> {
    try_join_all(transactions.iter().enumerate().map(|(index, tx)| async move {
        let mut statuses = tx.subscribe();
        match statuses.next().await {
            Some(Ok(OperationStatus::BatchTransactionData(data))) => Ok(data),
            Some(Err(SdkError::BatchNotBatchable { .. })) | Some(Ok(_)) | None => {
                Err(SdkError::BatchNotBatchable { index })
            }
            Some(Err(err)) => Err(err),
        }
    }))
    .await
}
