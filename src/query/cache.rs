//! Keyed query cache.
//!
//! Maps canonical keys to at most one live [`SharedStream`]. Streams are
//! created lazily on first lookup and kept until evicted or cleared.
//!
//! # Design Decisions
//! - Entries are keyed by value type as well as canonical key, so two call
//!   sites that reuse a key for different types cannot collide
//! - Lookup and registration go through the `DashMap` entry API; concurrent
//!   requesters of one key always observe the same stream
//! - With `max_entries` set, the least recently accessed entries are dropped
//!   after an insertion; their current subscribers keep their stream

use std::any::{Any, TypeId};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::stream::{self, Stream};

use crate::config::schema::{CacheConfig, CacheTime};
use crate::error::SdkResult;
use crate::observability::metrics;
use crate::query::key::Key;
use crate::query::query::Query;
use crate::query::shared::{Shareable, ShareOptions, SharedStream};

/// Per-query overrides of the instance cache defaults.
///
/// Unset fields fall back to the [`CacheConfig`] of the cache instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub cache: Option<bool>,
    pub observable_cache_time: Option<CacheTime>,
    pub value_cache_time: Option<CacheTime>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable replay and idle teardown delay for this query.
    pub fn no_cache(mut self) -> Self {
        self.cache = Some(false);
        self
    }

    pub fn observable_cache_time(mut self, time: impl Into<CacheTime>) -> Self {
        self.observable_cache_time = Some(time.into());
        self
    }

    pub fn value_cache_time(mut self, time: impl Into<CacheTime>) -> Self {
        self.value_cache_time = Some(time.into());
        self
    }
}

type EntryKey = (TypeId, String);

struct CacheEntry {
    stream: Box<dyn Any + Send + Sync>,
    last_access: AtomicU64,
}

/// A thread-safe map from query keys to shared streams.
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<DashMap<EntryKey, CacheEntry>>,
    clock: Arc<AtomicU64>,
    config: CacheConfig,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resolve `key` to its shared stream, building it from `factory` on a miss.
    ///
    /// `None` (or a disabled cache) yields a fresh uncached stream per call.
    pub fn query<T, F, S>(&self, key: Option<Key>, factory: F, options: QueryOptions) -> Query<T>
    where
        T: Shareable,
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = SdkResult<T>> + Send + 'static,
    {
        let key = match key {
            Some(key) if self.config.enabled && key.is_cacheable() => key,
            other => {
                if let Some(key) = other.as_ref().filter(|key| !key.is_cacheable()) {
                    tracing::warn!(key = ?key, "Uncacheable key, running query uncached");
                }
                metrics::record_cache_lookup("uncached");
                let share = ShareOptions {
                    capacity: self.config.broadcast_capacity,
                    ..ShareOptions::uncached()
                };
                return Query::new(SharedStream::new("<uncached>", factory, share));
            }
        };

        let canonical = key.canonical();
        let entry_key = (TypeId::of::<T>(), canonical.clone());
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);

        if let Some(entry) = self.entries.get(&entry_key) {
            if let Some(shared) = entry.stream.downcast_ref::<SharedStream<T>>() {
                entry.last_access.store(tick, Ordering::Relaxed);
                metrics::record_cache_lookup("hit");
                tracing::debug!(key = %canonical, "Query cache hit");
                return Query::new(shared.clone());
            }
        }

        let candidate = SharedStream::new(canonical.clone(), factory, self.share_options(&options));
        let (shared, inserted) = match self.entries.entry(entry_key) {
            Entry::Occupied(entry) => {
                let existing = entry.get();
                existing.last_access.store(tick, Ordering::Relaxed);
                let shared = existing
                    .stream
                    .downcast_ref::<SharedStream<T>>()
                    .cloned()
                    .unwrap_or(candidate);
                (shared, false)
            }
            Entry::Vacant(entry) => {
                entry.insert(CacheEntry {
                    stream: Box::new(candidate.clone()),
                    last_access: AtomicU64::new(tick),
                });
                (candidate, true)
            }
        };

        if inserted {
            metrics::record_cache_lookup("miss");
            tracing::debug!(key = %canonical, "Query cache miss, registered stream");
            self.evict_excess();
            metrics::record_cache_size(self.entries.len());
        } else {
            metrics::record_cache_lookup("hit");
        }
        Query::new(shared)
    }

    /// Cache a one-shot async producer.
    pub fn query_future<T, F, Fut>(&self, key: Option<Key>, f: F, options: QueryOptions) -> Query<T>
    where
        T: Shareable,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SdkResult<T>> + Send + 'static,
    {
        self.query(key, move || stream::once(f()), options)
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Existing subscribers keep their streams.
    pub fn clear(&self) {
        self.entries.clear();
        metrics::record_cache_size(0);
    }

    fn share_options(&self, options: &QueryOptions) -> ShareOptions {
        if !options.cache.unwrap_or(true) {
            return ShareOptions {
                capacity: self.config.broadcast_capacity,
                ..ShareOptions::uncached()
            };
        }

        ShareOptions {
            replay: true,
            reset_delay: options
                .observable_cache_time
                .unwrap_or(self.config.observable_cache_time)
                .as_duration(),
            value_ttl: options
                .value_cache_time
                .unwrap_or(self.config.value_cache_time)
                .as_duration(),
            capacity: self.config.broadcast_capacity,
        }
    }

    fn evict_excess(&self) {
        let Some(max) = self.config.max_entries else {
            return;
        };

        while self.entries.len() > max {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.last_access.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());

            match oldest {
                Some(key) => {
                    tracing::debug!(key = %key.1, "Evicting least recently used query");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
