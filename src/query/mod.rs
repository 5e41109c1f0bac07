//! Keyed, shared and cached data access.
//!
//! # Data Flow
//! ```text
//! query(key, factory) → QueryCache ─hit──→ existing SharedStream
//!                                  └miss─→ new SharedStream (registered)
//! SharedStream ── one producer execution ──→ broadcast ──→ Subscription × N
//! Query ── await ──→ first value (buffered or next emission)
//! ```
//!
//! # Design Decisions
//! - Every query goes through a [`SharedStream`]; uncached queries simply get a
//!   private one with replay off and an immediate reset
//! - Cache lifetimes come from [`crate::config::CacheConfig`] and can be
//!   overridden per query with [`QueryOptions`]

pub mod cache;
pub mod key;
pub mod poll;
#[allow(clippy::module_inception)]
pub mod query;
pub mod shared;

pub use cache::{QueryCache, QueryOptions};
pub use key::Key;
pub use poll::poll;
pub use query::Query;
pub use shared::{ShareOptions, Shareable, SharedStream, Subscription};
