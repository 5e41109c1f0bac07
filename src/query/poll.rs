//! Interval polling producer.

use std::future::Future;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::error::SdkResult;

struct PollState<T, F> {
    fetch: F,
    period: Duration,
    ticker: Option<Interval>,
    last: Option<T>,
    done: bool,
}

/// A producer that runs `fetch` immediately and then every `period`.
///
/// Only values that differ from the previous emission are yielded. The stream
/// ends after the first error.
pub fn poll<T, F, Fut>(period: Duration, fetch: F) -> impl Stream<Item = SdkResult<T>> + Send + 'static
where
    T: Clone + PartialEq + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = SdkResult<T>> + Send + 'static,
{
    let state = PollState {
        fetch,
        period,
        ticker: None,
        last: None,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        let ticker = state.ticker.get_or_insert_with(|| {
            let mut ticker = interval(state.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            ticker.tick().await;
            match (state.fetch)().await {
                Ok(value) if state.last.as_ref() == Some(&value) => continue,
                Ok(value) => {
                    state.last = Some(value.clone());
                    return Some((Ok(value), state));
                }
                Err(err) => {
                    tracing::debug!(error = %err, "Polling stopped");
                    state.done = true;
                    return Some((Err(err), state));
                }
            }
        }
    })
}
