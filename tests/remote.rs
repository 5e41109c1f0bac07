//! Indexer and content store clients against a local HTTP backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use protocol_sdk::config::{IndexerConfig, IpfsConfig};
use protocol_sdk::remote::{IndexerClient, IpfsClient};
use protocol_sdk::{Sdk, SdkConfig, SdkError};
use serde::Deserialize;
use serde_json::{json, Value};

mod common;

use common::RecordedRequest;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Pools {
    pools: Vec<Pool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Pool {
    id: String,
}

async fn recording_backend(
    response: &'static str,
) -> (String, Arc<Mutex<Vec<RecordedRequest>>>, Arc<AtomicU32>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let hits = Arc::new(AtomicU32::new(0));
    let (seen_clone, hits_clone) = (seen.clone(), hits.clone());
    let addr = common::start_programmable_backend(move |request| {
        seen_clone.lock().push(request);
        hits_clone.fetch_add(1, Ordering::SeqCst);
        async move { (200, response.to_string()) }
    })
    .await;
    (format!("http://{}", addr), seen, hits)
}

#[tokio::test]
async fn test_indexer_fetch() {
    let (url, seen, _) = recording_backend(r#"{"data":{"pools":[{"id":"0x01"}]}}"#).await;
    let client = IndexerClient::new(&format!("{}/graphql", url), std::time::Duration::from_secs(5)).unwrap();

    let pools: Pools = client
        .fetch("query Pools($first: Int) { pools(first: $first) { id } }", json!({ "first": 1 }))
        .await
        .unwrap();
    assert_eq!(pools.pools[0].id, "0x01");

    let request = seen.lock()[0].clone();
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/graphql");
    let body: Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["variables"]["first"], 1);
    assert!(body["query"].as_str().unwrap().contains("pools"));
}

#[tokio::test]
async fn test_indexer_errors_are_remote_errors() {
    let (url, _, _) =
        recording_backend(r#"{"data":null,"errors":[{"message":"Unknown field"}]}"#).await;
    let client = IndexerClient::new(&url, std::time::Duration::from_secs(5)).unwrap();

    let err = client.fetch::<Pools>("{ nope }", Value::Null).await.unwrap_err();
    match err {
        SdkError::Remote(message) => assert!(message.contains("Unknown field")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_http_failure_is_remote_error() {
    let addr = common::start_programmable_backend(|_| async { (500, "oops".to_string()) }).await;
    let client = IndexerClient::new(&format!("http://{}", addr), std::time::Duration::from_secs(5)).unwrap();
    let err = client.fetch::<Pools>("{ pools { id } }", Value::Null).await.unwrap_err();
    assert!(matches!(err, SdkError::Remote(_)));
}

#[tokio::test]
async fn test_ipfs_fetch_and_pin() {
    let (url, seen, _) = recording_backend(r#"{"name":"Vault","uri":"ipfs://bafypinned"}"#).await;
    let client = IpfsClient::new(&IpfsConfig {
        gateway_url: url.clone(),
        pin_url: Some(format!("{}/pin", url)),
        ..IpfsConfig::default()
    })
    .unwrap();

    let doc: Value = client.fetch_json("ipfs://bafydoc").await.unwrap();
    assert_eq!(doc["name"], "Vault");

    let cid = client.pin_json(&json!({ "name": "Vault" })).await.unwrap();
    assert_eq!(cid, "bafypinned");

    let requests = seen.lock().clone();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/ipfs/bafydoc");
    assert_eq!(requests[1].method, "POST");
    assert_eq!(requests[1].path, "/pin");
}

#[tokio::test]
async fn test_sdk_remote_queries_are_cached() {
    let (url, _, hits) = recording_backend(r#"{"data":{"pools":[{"id":"0x02"}]}}"#).await;
    let sdk = Sdk::new(SdkConfig {
        indexer: IndexerConfig {
            url: Some(url.clone()),
            ..IndexerConfig::default()
        },
        ipfs: IpfsConfig {
            gateway_url: url,
            ..IpfsConfig::default()
        },
        ..SdkConfig::default()
    })
    .unwrap();

    let query = "{ pools { id } }";
    let first: Pools = sdk.indexer_query(query, Value::Null).await.unwrap();
    let second: Pools = sdk.indexer_query(query, Value::Null).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let doc = sdk.ipfs_json::<Value>("bafydoc");
    doc.get().await.unwrap();
    doc.get().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
