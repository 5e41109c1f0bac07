//! Awaitable adapter over a shared stream.

use std::future::IntoFuture;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;

use crate::error::{SdkError, SdkResult};
use crate::query::shared::{Shareable, SharedStream, Subscription};

/// A query result that can be awaited for one value or subscribed to.
///
/// Awaiting resolves with the buffered value when one is valid, otherwise
/// with the next emission. The query stays subscribable afterwards:
///
/// ```ignore
/// let price = sdk.query(key!["price"], fetch_price, QueryOptions::new());
/// let now = (&price).await?;
/// let mut updates = price.subscribe();
/// ```
pub struct Query<T> {
    shared: SharedStream<T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Shareable> Query<T> {
    pub(crate) fn new(shared: SharedStream<T>) -> Self {
        Self { shared }
    }

    /// Continuous subscription; see [`Subscription`].
    pub fn subscribe(&self) -> Subscription<T> {
        self.shared.subscribe()
    }

    /// First available value.
    pub async fn get(&self) -> SdkResult<T> {
        let mut subscription = self.subscribe();
        subscription.next().await.unwrap_or(Err(SdkError::NoValue))
    }

    /// Whether both queries resolve through the same shared stream.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.shared.ptr_eq(&other.shared)
    }

    /// Canonical key, or `<uncached>`.
    pub fn label(&self) -> &str {
        self.shared.label()
    }

    /// Number of live subscriptions on the underlying stream.
    pub fn subscriber_count(&self) -> usize {
        self.shared.consumer_count()
    }
}

impl<T: Shareable> IntoFuture for Query<T> {
    type Output = SdkResult<T>;
    type IntoFuture = BoxFuture<'static, SdkResult<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.get().await })
    }
}

impl<'a, T: Shareable> IntoFuture for &'a Query<T> {
    type Output = SdkResult<T>;
    type IntoFuture = BoxFuture<'a, SdkResult<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.get())
    }
}
