//! Shared multicast stream with replay and delayed reset.
//!
//! # States
//! - Idle: no producer execution; the next consumer starts one
//! - Running: one producer execution is feeding all consumers
//! - Completed: the producer finished after emitting; its last value may be buffered
//!
//! # State Transitions
//! ```text
//! Idle → Running: a consumer subscribes
//! Running → Completed: producer ends after at least one value
//! Running → Idle: producer fails (error is delivered to current consumers)
//! Any → Idle: reset delay elapses with zero consumers
//! Any → Idle → Running: buffered value older than the value TTL on access
//! ```
//!
//! # Design Decisions
//! - Emissions fan out through a `broadcast` channel that outlives producer
//!   executions, so attached consumers keep receiving values across restarts
//! - A reset aborts the running producer task, which drops the producer stream;
//!   the generation counter discards anything a superseded task races in
//! - Expiry and pending resets are also evaluated on access, so the outcome does
//!   not depend on when the timer task gets polled

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{sleep, Instant};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::{SdkError, SdkResult};
use crate::observability::metrics;

/// Values that can be multicast to many consumers.
pub trait Shareable: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Shareable for T {}

type Producer<T> = Arc<dyn Fn() -> BoxStream<'static, SdkResult<T>> + Send + Sync>;

/// The three independent knobs of a shared stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareOptions {
    /// Buffer size 1 when true: new consumers immediately get the last value.
    pub replay: bool,
    /// Grace period after the last consumer leaves. `None` never tears down.
    pub reset_delay: Option<Duration>,
    /// Maximum age of the buffered value. `None` is unbounded.
    pub value_ttl: Option<Duration>,
    /// Broadcast buffer for consumers that fall behind.
    pub capacity: usize,
}

impl ShareOptions {
    /// No replay, torn down as soon as the last consumer leaves.
    pub fn uncached() -> Self {
        Self {
            replay: false,
            reset_delay: Some(Duration::ZERO),
            value_ttl: None,
            capacity: 16,
        }
    }
}

impl Default for ShareOptions {
    fn default() -> Self {
        Self {
            replay: true,
            reset_delay: Some(Duration::from_secs(60)),
            value_ttl: None,
            capacity: 64,
        }
    }
}

#[derive(Clone)]
enum Event<T> {
    Next(T),
    Error(SdkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Completed,
}

struct Buffered<T> {
    value: T,
    at: Instant,
}

struct PendingReset {
    deadline: Instant,
    timer: JoinHandle<()>,
}

struct State<T> {
    generation: u64,
    phase: Phase,
    buffered: Option<Buffered<T>>,
    consumers: usize,
    pending_reset: Option<PendingReset>,
    producer: Option<AbortHandle>,
}

impl<T> State<T> {
    fn reset(&mut self) {
        self.generation += 1;
        self.phase = Phase::Idle;
        self.buffered = None;
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

struct Inner<T> {
    label: String,
    produce: Producer<T>,
    options: ShareOptions,
    sender: broadcast::Sender<Event<T>>,
    state: Mutex<State<T>>,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(producer) = self.state.get_mut().producer.take() {
            producer.abort();
        }
    }
}

/// A stream many consumers observe through one producer execution.
pub struct SharedStream<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SharedStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Shareable> SharedStream<T> {
    /// Wrap a producer factory. Nothing runs until the first subscription.
    pub fn new<F, S>(label: impl Into<String>, produce: F, options: ShareOptions) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = SdkResult<T>> + Send + 'static,
    {
        let (sender, _) = broadcast::channel(options.capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                label: label.into(),
                produce: Arc::new(move || produce().boxed()),
                options,
                sender,
                state: Mutex::new(State {
                    generation: 0,
                    phase: Phase::Idle,
                    buffered: None,
                    consumers: 0,
                    pending_reset: None,
                    producer: None,
                }),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn options(&self) -> ShareOptions {
        self.inner.options
    }

    /// Number of live subscriptions.
    pub fn consumer_count(&self) -> usize {
        self.inner.state.lock().consumers
    }

    /// Whether both handles point at the same stream.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attach a consumer, starting a producer execution when none is usable.
    pub fn subscribe(&self) -> Subscription<T> {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        if let Some(pending) = state.pending_reset.take() {
            pending.timer.abort();
            if Instant::now() >= pending.deadline && state.phase != Phase::Idle {
                tracing::debug!(key = %inner.label, "Grace period elapsed, resetting");
                metrics::record_teardown("idle");
                state.reset();
            }
        }

        let expired = match (&state.buffered, inner.options.value_ttl) {
            (Some(buffered), Some(ttl)) => buffered.at.elapsed() > ttl,
            _ => false,
        };
        if expired {
            tracing::debug!(key = %inner.label, "Buffered value expired, refreshing");
            metrics::record_teardown("expired");
            state.reset();
        }

        let needs_start = match state.phase {
            Phase::Idle => true,
            Phase::Running => false,
            Phase::Completed => state.buffered.is_none(),
        };
        if needs_start {
            Self::start(inner, &mut state);
        }

        state.consumers += 1;
        let replay = if inner.options.replay {
            state.buffered.as_ref().map(|b| b.value.clone())
        } else {
            None
        };
        let events = BroadcastStream::new(inner.sender.subscribe());
        drop(state);

        Subscription {
            shared: self.clone(),
            replay,
            events,
            finished: false,
        }
    }

    fn start(inner: &Arc<Inner<T>>, state: &mut State<T>) {
        state.generation += 1;
        state.phase = Phase::Running;
        let generation = state.generation;

        tracing::debug!(key = %inner.label, generation, "Starting producer");
        metrics::record_producer_run();

        let task = tokio::spawn(drive(Arc::downgrade(inner), generation, inner.produce.clone()));
        state.producer = Some(task.abort_handle());
    }

    fn release(&self) {
        let mut state = self.inner.state.lock();
        state.consumers = state.consumers.saturating_sub(1);
        if state.consumers > 0 {
            return;
        }

        match self.inner.options.reset_delay {
            None => {}
            Some(delay) if delay.is_zero() => {
                if state.phase != Phase::Idle {
                    metrics::record_teardown("idle");
                }
                state.reset();
            }
            Some(delay) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let shared = Arc::downgrade(&self.inner);
                    let timer = handle.spawn(async move {
                        sleep(delay).await;
                        if let Some(inner) = shared.upgrade() {
                            let mut state = inner.state.lock();
                            // A newer timer may have replaced this one.
                            let due = state
                                .pending_reset
                                .as_ref()
                                .is_some_and(|p| Instant::now() >= p.deadline);
                            if !due || state.consumers > 0 {
                                return;
                            }
                            state.pending_reset = None;
                            if state.phase != Phase::Idle {
                                tracing::debug!(key = %inner.label, "Grace period elapsed, resetting");
                                metrics::record_teardown("idle");
                                state.reset();
                            }
                        }
                    });
                    state.pending_reset = Some(PendingReset {
                        deadline: Instant::now() + delay,
                        timer,
                    });
                }
                // Outside a runtime there is nothing to run the timer; reset now.
                Err(_) => state.reset(),
            },
        }
    }
}

/// Runs one producer execution and feeds its output to the channel.
async fn drive<T: Shareable>(shared: Weak<Inner<T>>, generation: u64, produce: Producer<T>) {
    let mut stream = produce();
    let mut emitted = false;

    loop {
        let item = stream.next().await;

        let Some(inner) = shared.upgrade() else {
            return;
        };
        let mut state = inner.state.lock();
        if state.generation != generation {
            tracing::trace!(key = %inner.label, generation, "Dropping output of superseded producer");
            return;
        }

        match item {
            Some(Ok(value)) => {
                emitted = true;
                if inner.options.replay {
                    state.buffered = Some(Buffered {
                        value: value.clone(),
                        at: Instant::now(),
                    });
                }
                let _ = inner.sender.send(Event::Next(value));
            }
            Some(Err(err)) => {
                tracing::warn!(key = %inner.label, error = %err, "Producer failed");
                metrics::record_producer_error();
                metrics::record_teardown("error");
                state.reset();
                let _ = inner.sender.send(Event::Error(err));
                return;
            }
            None if emitted => {
                state.phase = Phase::Completed;
                state.producer = None;
                return;
            }
            None => {
                tracing::warn!(key = %inner.label, "Producer completed without a value");
                state.reset();
                let _ = inner.sender.send(Event::Error(SdkError::NoValue));
                return;
            }
        }
    }
}

/// One consumer of a [`SharedStream`].
///
/// Yields the replayed value first (if any), then every emission. Ends after
/// delivering an error, and only then: when the producer completes normally
/// the subscription stays open (pending) so it can receive values from a later
/// refresh. Use [`StreamExt::next`] or the query's `await` for one-shot
/// values instead of draining it with `while let`. Dropping it releases the
/// consumer slot.
pub struct Subscription<T: Shareable> {
    shared: SharedStream<T>,
    replay: Option<T>,
    events: BroadcastStream<Event<T>>,
    finished: bool,
}

// No field is structurally pinned.
impl<T: Shareable> Unpin for Subscription<T> {}

impl<T: Shareable> Stream for Subscription<T> {
    type Item = SdkResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(value) = this.replay.take() {
            return Poll::Ready(Some(Ok(value)));
        }
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match this.events.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Ready(Some(Ok(Event::Next(value)))) => return Poll::Ready(Some(Ok(value))),
                Poll::Ready(Some(Ok(Event::Error(err)))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    tracing::warn!(key = %this.shared.label(), skipped, "Subscriber lagged behind");
                }
            }
        }
    }
}

impl<T: Shareable> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.shared.release();
    }
}
