//! Query cache behavior observed through the SDK.

use std::future::IntoFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use protocol_sdk::config::{CacheConfig, CacheTime};
use protocol_sdk::{key, Key, Query, QueryOptions, Sdk, SdkConfig, SdkError};
use serde_json::json;
use tokio::time::advance;

mod common;

fn sdk() -> Sdk {
    Sdk::new(SdkConfig::default()).unwrap()
}

/// A query whose value is the number of times its producer ran.
fn counting(sdk: &Sdk, key: Option<Key>, options: QueryOptions) -> (Query<usize>, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let query = sdk.query_future(
        key,
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n) }
        },
        options,
    );
    (query, runs)
}

#[tokio::test(start_paused = true)]
async fn test_equal_keys_resolve_to_one_stream() {
    let sdk = sdk();
    let runs = Arc::new(AtomicUsize::new(0));

    let make = |key: Key| {
        let runs = runs.clone();
        sdk.query_future(
            Some(key),
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Ok("pool".to_string()) }
            },
            QueryOptions::new(),
        )
    };

    let a = make(key!["pool", json!({ "chain": 1, "id": "0xabc" })]);
    let b = make(key!["pool", json!({ "id": "0xabc", "chain": 1 })]);
    assert!(a.ptr_eq(&b));

    let (x, y) = tokio::join!((&a).into_future(), (&b).into_future());
    assert_eq!(x.unwrap(), "pool");
    assert_eq!(y.unwrap(), "pool");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_keys_are_independent() {
    let sdk = sdk();
    let (a, runs_a) = counting(&sdk, Some(key!["a"]), QueryOptions::new());
    let (b, runs_b) = counting(&sdk, Some(key!["b"]), QueryOptions::new());

    assert!(!a.ptr_eq(&b));
    assert_eq!((&a).await.unwrap(), 1);
    assert_eq!((&b).await.unwrap(), 1);
    assert_eq!(runs_a.load(Ordering::SeqCst), 1);
    assert_eq!(runs_b.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_key_runs_on_every_await() {
    let sdk = sdk();
    let (query, _) = counting(&sdk, None, QueryOptions::new());

    assert_eq!((&query).await.unwrap(), 1);
    assert_eq!((&query).await.unwrap(), 2);
    assert!(sdk.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_default_caching_runs_once() {
    let sdk = sdk();
    let (query, runs) = counting(&sdk, Some(key!["cached"]), QueryOptions::new());

    assert_eq!((&query).await.unwrap(), 1);
    let mut subscription = query.subscribe();
    assert_eq!(subscription.next().await.unwrap().unwrap(), 1);
    assert_eq!((&query).await.unwrap(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_value_cache_time_expires_value() {
    let sdk = sdk();
    let options = QueryOptions::new().value_cache_time(Duration::from_secs(1));
    let (query, runs) = counting(&sdk, Some(key!["expiring"]), options);

    assert_eq!((&query).await.unwrap(), 1);
    assert_eq!((&query).await.unwrap(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    advance(Duration::from_millis(1001)).await;
    assert_eq!((&query).await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_infinite_observable_cache_time() {
    let sdk = sdk();
    let options = QueryOptions::new().observable_cache_time(CacheTime::Infinite);
    let (query, runs) = counting(&sdk, Some(key!["forever"]), options);

    assert_eq!((&query).await.unwrap(), 1);
    advance(Duration::from_secs(7 * 24 * 3600)).await;
    assert_eq!((&query).await.unwrap(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_observable_cache_time_tears_down_idle_stream() {
    let sdk = sdk();
    let options = QueryOptions::new().observable_cache_time(Duration::from_secs(5));
    let (query, _) = counting(&sdk, Some(key!["idle"]), options);

    assert_eq!((&query).await.unwrap(), 1);
    advance(Duration::from_secs(4)).await;
    assert_eq!((&query).await.unwrap(), 1);
    advance(Duration::from_secs(6)).await;
    assert_eq!((&query).await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_active_subscriber_receives_refresh() {
    let sdk = sdk();
    let options = QueryOptions::new().value_cache_time(Duration::from_secs(1));
    let (query, _) = counting(&sdk, Some(key!["live"]), options);

    let mut subscription = query.subscribe();
    let mut last = subscription.next().await.unwrap().unwrap();
    assert_eq!(last, 1);

    advance(Duration::from_millis(1500)).await;
    assert_eq!((&query).await.unwrap(), 2);

    last = subscription.next().await.unwrap().unwrap();
    assert_eq!(last, 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_producer_retries_on_next_access() {
    let sdk = sdk();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let query = sdk.query_future(
        Some(key!["flaky"]),
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err(SdkError::producer("indexer timeout"))
                } else {
                    Ok(n)
                }
            }
        },
        QueryOptions::new(),
    );

    let err = (&query).await.unwrap_err();
    assert!(err.is_producer_error());
    assert_eq!((&query).await.unwrap(), 2);
    assert_eq!((&query).await.unwrap(), 2);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_instance_cache() {
    let sdk = Sdk::new(SdkConfig {
        cache: CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        },
        ..SdkConfig::default()
    })
    .unwrap();
    let (query, runs) = counting(&sdk, Some(key!["ignored"]), QueryOptions::new());

    assert_eq!((&query).await.unwrap(), 1);
    assert_eq!((&query).await.unwrap(), 2);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_block_number_is_polled_and_shared() {
    let sdk = sdk();
    let chain = common::MockChain::new(1);
    sdk.register_chain(chain.clone());

    let a = sdk.block_number(1);
    let b = sdk.block_number(1);
    assert!(a.ptr_eq(&b));

    let mut heads = a.subscribe();
    assert_eq!(heads.next().await.unwrap().unwrap(), 100);
    assert_eq!((&b).await.unwrap(), 100);

    chain.set_block(101);
    assert_eq!(heads.next().await.unwrap().unwrap(), 101);
}

#[tokio::test(start_paused = true)]
async fn test_balance_and_read_contract() {
    let sdk = sdk();
    let chain = common::MockChain::new(1);
    sdk.register_chain(chain.clone());

    let owner = alloy::primitives::Address::repeat_byte(0x42);
    assert_eq!(sdk.balance(1, owner).await.unwrap(), chain.balance);

    let to = alloy::primitives::Address::repeat_byte(0xaa);
    let data = alloy::primitives::Bytes::from_static(&[0x70, 0xa0, 0x82, 0x31]);
    let read = sdk.read_contract(1, to, data.clone());
    assert!(read.ptr_eq(&sdk.read_contract(1, to, data)));
    assert_eq!(read.await.unwrap(), chain.call_result);
}
