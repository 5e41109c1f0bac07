//! Transaction sequencing.
//!
//! # Data Flow
//! ```text
//! transact(chain_id, callback) → Transaction (lazy)
//!     subscribe → driver task: signer check → address → [chain switch]
//!              → WalletClient → callback(TransactionContext)
//!              → statuses over mpsc → TransactionStream
//! batch(title, [Transaction]) → each marked batched → first BatchTransactionData
//!     of each → merged multicall → one transaction
//! ```
//!
//! # Design Decisions
//! - One driver task per subscription; statuses reach the consumer in the
//!   order the callback produced them
//! - Dropping the stream stops the driver at its next suspension point
//! - Errors are delivered once as the final stream item

pub mod batch;
pub mod context;
pub mod engine;
pub mod status;

pub use context::{Step, StepOutcome, TransactionContext};
pub use engine::{Transaction, TransactionEngine, TransactionStream};
pub use status::{BatchTransactionData, ContractCall, OperationStatus};
