//! Remote data sources.
//!
//! Both clients follow the same contract: one request in, parsed data or an
//! [`crate::SdkError::Remote`] out. Caching and polling frequency are decided
//! by the query layer, not here.

pub mod indexer;
pub mod ipfs;

pub use indexer::IndexerClient;
pub use ipfs::IpfsClient;
