//! Transaction sequencing engine.
//!
//! # State Transitions
//! ```text
//! Init → [SwitchingChain] → steps { SigningMessage → SignedMessage
//!                                 | SigningTransaction → TransactionPending → TransactionConfirmed }
//!      → Done
//! Any → Error (terminal; no further steps run)
//! ```

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use arc_swap::ArcSwapOption;
use futures_util::future::BoxFuture;
use futures_util::stream::{Stream, StreamExt};
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::blockchain::registry::ChainRegistry;
use crate::blockchain::signer::{Signer, WalletClient};
use crate::error::{SdkError, SdkResult};
use crate::observability::metrics;
use crate::transaction::context::{emit, StatusSender, Step, TransactionContext};
use crate::transaction::status::OperationStatus;

pub(crate) type Sequence =
    Arc<dyn Fn(TransactionContext) -> BoxFuture<'static, SdkResult<()>> + Send + Sync>;

type Prepare = Arc<dyn Fn() -> BoxFuture<'static, SdkResult<Sequence>> + Send + Sync>;

/// What an execution runs once the signer is resolved.
#[derive(Clone)]
enum Body {
    Sequence(Sequence),
    /// Resolved after the signer check and before any chain switch, so a
    /// failure here never prompts the signer.
    Prepared(Prepare),
}

const DEFAULT_STATUS_CAPACITY: usize = 16;

/// Builds transactions against the attached signer and the chain registry.
#[derive(Clone)]
pub struct TransactionEngine {
    signer: Arc<ArcSwapOption<Signer>>,
    chains: ChainRegistry,
    capacity: usize,
}

impl TransactionEngine {
    pub fn new(chains: ChainRegistry) -> Self {
        Self {
            signer: Arc::new(ArcSwapOption::empty()),
            chains,
            capacity: DEFAULT_STATUS_CAPACITY,
        }
    }

    /// Attach or detach the signer. Executions already running keep theirs.
    pub fn set_signer(&self, signer: Option<Signer>) {
        match &signer {
            Some(signer) => tracing::info!(signer = ?signer, "Signer attached"),
            None => tracing::info!("Signer detached"),
        }
        self.signer.store(signer.map(Arc::new));
    }

    pub fn signer(&self) -> Option<Signer> {
        self.signer.load_full().map(|signer| signer.as_ref().clone())
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    /// A lazy transaction: `callback` runs once per subscription.
    pub fn transact<F, Fut>(&self, chain_id: u64, callback: F) -> Transaction
    where
        F: Fn(TransactionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SdkResult<()>> + Send + 'static,
    {
        Transaction {
            engine: self.clone(),
            chain_id,
            body: Body::Sequence(Arc::new(move |ctx| callback(ctx).boxed())),
            batched: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A transaction whose sequence is built by `prepare` on every execution.
    pub(crate) fn transact_prepared<P, Fut>(&self, chain_id: u64, prepare: P) -> Transaction
    where
        P: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SdkResult<Sequence>> + Send + 'static,
    {
        Transaction {
            engine: self.clone(),
            chain_id,
            body: Body::Prepared(Arc::new(move || prepare().boxed())),
            batched: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A transaction made of an ordered list of steps.
    pub fn transact_steps(&self, chain_id: u64, steps: Vec<Step>) -> Transaction {
        let steps = Arc::new(steps);
        self.transact(chain_id, move |ctx| {
            let steps = steps.clone();
            async move {
                for step in steps.iter() {
                    ctx.run(step.clone()).await?;
                }
                Ok::<(), SdkError>(())
            }
        })
    }
}

/// A deferred multi-step signed operation.
///
/// Each [`Transaction::subscribe`] performs one execution. Awaiting the
/// transaction resolves with its last status.
#[derive(Clone)]
pub struct Transaction {
    engine: TransactionEngine,
    chain_id: u64,
    body: Body,
    batched: Arc<AtomicBool>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("chain_id", &self.chain_id)
            .field("batched", &self.is_batched())
            .finish()
    }
}

impl Transaction {
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Switch to batch mode: no chain switch, calls become batch data.
    pub fn mark_batched(&self) {
        self.batched.store(true, Ordering::SeqCst);
    }

    pub fn is_batched(&self) -> bool {
        self.batched.load(Ordering::SeqCst)
    }

    /// Start an execution and observe its statuses in order.
    pub fn subscribe(&self) -> TransactionStream {
        let (events, receiver) = mpsc::channel(self.engine.capacity.max(1));
        let task = tokio::spawn(drive(
            self.engine.clone(),
            self.chain_id,
            self.body.clone(),
            self.is_batched(),
            events,
        ));
        TransactionStream {
            inner: ReceiverStream::new(receiver),
            task,
        }
    }

    /// Run to completion and collect every status.
    pub async fn statuses(&self) -> SdkResult<Vec<OperationStatus>> {
        let mut stream = self.subscribe();
        let mut statuses = Vec::new();
        while let Some(status) = stream.next().await {
            statuses.push(status?);
        }
        Ok(statuses)
    }
}

impl IntoFuture for Transaction {
    type Output = SdkResult<OperationStatus>;
    type IntoFuture = BoxFuture<'static, SdkResult<OperationStatus>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let mut stream = self.subscribe();
            let mut last = None;
            while let Some(status) = stream.next().await {
                last = Some(status?);
            }
            last.ok_or(SdkError::NoValue)
        })
    }
}

async fn drive(
    engine: TransactionEngine,
    chain_id: u64,
    body: Body,
    batching: bool,
    events: StatusSender,
) {
    match execute(&engine, chain_id, body, batching, &events).await {
        Ok(()) => tracing::debug!(chain_id, "Transaction sequence completed"),
        Err(SdkError::Cancelled) => tracing::debug!(chain_id, "Transaction consumer went away"),
        Err(err) => {
            tracing::warn!(chain_id, error = %err, "Transaction failed");
            metrics::record_transaction_error();
            let _ = events.send(Err(err)).await;
        }
    }
}

async fn execute(
    engine: &TransactionEngine,
    chain_id: u64,
    body: Body,
    batching: bool,
    events: &StatusSender,
) -> SdkResult<()> {
    let signer = engine.signer().ok_or(SdkError::NoSigner)?;
    let sequence = match body {
        Body::Sequence(sequence) => sequence,
        Body::Prepared(prepare) => prepare().await?,
    };
    let address = signer.address().await?;

    if !batching {
        if let Some(current) = signer.chain_id().await? {
            if current != chain_id {
                emit(events, OperationStatus::SwitchingChain { chain_id }).await?;
                tracing::info!(from = current, to = chain_id, "Switching signer chain");
                signer.switch_chain(chain_id).await?;
            }
        }
    }

    let chain = engine.chains.get(chain_id)?;
    let wallet = WalletClient::new(
        signer.clone(),
        address,
        chain,
        engine.chains.gas_policy(chain_id),
    );
    let ctx = TransactionContext::new(chain_id, address, wallet, signer, batching, events.clone());

    sequence(ctx).await
}

/// Statuses of one execution. Dropping it stops the execution.
pub struct TransactionStream {
    inner: ReceiverStream<SdkResult<OperationStatus>>,
    task: JoinHandle<()>,
}

impl Stream for TransactionStream {
    type Item = SdkResult<OperationStatus>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for TransactionStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_signer_rejects() {
        let engine = TransactionEngine::new(ChainRegistry::new());
        let tx = engine.transact(1, |_ctx| async { Ok(()) });
        assert!(matches!(tx.await, Err(SdkError::NoSigner)));
    }

    #[tokio::test]
    async fn test_unknown_chain_rejects() {
        let engine = TransactionEngine::new(ChainRegistry::new());
        engine.set_signer(Some(Signer::from(crate::blockchain::Wallet::random())));
        let tx = engine.transact(5, |_ctx| async { Ok(()) });
        assert!(matches!(tx.statuses().await, Err(SdkError::UnknownChain(5))));
    }

    #[test]
    fn test_mark_batched_is_shared_by_clones() {
        let engine = TransactionEngine::new(ChainRegistry::new());
        let tx = engine.transact(1, |_ctx| async { Ok(()) });
        let copy = tx.clone();
        tx.mark_batched();
        assert!(copy.is_batched());
    }
}
