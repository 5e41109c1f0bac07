//! Reactive data access and transaction orchestration for a multi-chain
//! tokenization protocol.

pub mod blockchain;
pub mod config;
pub mod error;
pub mod observability;
pub mod query;
pub mod remote;
pub mod sdk;
pub mod transaction;

pub use blockchain::{ExternalProvider, Signer, Wallet};
pub use config::schema::SdkConfig;
pub use error::{SdkError, SdkResult};
pub use query::{Key, Query, QueryOptions};
pub use sdk::Sdk;
pub use transaction::{OperationStatus, Step, Transaction, TransactionContext};
