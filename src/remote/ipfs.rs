//! Content-addressed file store client.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::schema::IpfsConfig;
use crate::error::{SdkError, SdkResult};

const IPFS_SCHEME: &str = "ipfs://";

#[derive(Debug, Deserialize)]
struct PinResponse {
    uri: Option<String>,
    cid: Option<String>,
}

/// Reads JSON documents through a gateway and pins new ones.
#[derive(Debug, Clone)]
pub struct IpfsClient {
    http: reqwest::Client,
    gateway: Url,
    pin_url: Option<Url>,
}

impl IpfsClient {
    pub fn new(config: &IpfsConfig) -> SdkResult<Self> {
        let gateway = Url::parse(&config.gateway_url)
            .map_err(|e| SdkError::Remote(format!("Invalid gateway URL: {}", e)))?;
        let pin_url = config
            .pin_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| SdkError::Remote(format!("Invalid pin URL: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            gateway,
            pin_url,
        })
    }

    /// Gateway URL of a document. Accepts a bare CID or an `ipfs://` URI.
    pub fn gateway_url(&self, hash: &str) -> String {
        format!(
            "{}/ipfs/{}",
            self.gateway.as_str().trim_end_matches('/'),
            hash.trim_start_matches(IPFS_SCHEME)
        )
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, hash: &str) -> SdkResult<T> {
        let url = self.gateway_url(hash);
        tracing::debug!(url = %url, "Fetching document");
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Pin `value` and return its CID.
    pub async fn pin_json<T: Serialize + ?Sized>(&self, value: &T) -> SdkResult<String> {
        let pin_url = self
            .pin_url
            .clone()
            .ok_or_else(|| SdkError::Remote("No pin URL configured".to_string()))?;

        let response = self
            .http
            .post(pin_url)
            .header(CONTENT_TYPE, "application/json")
            .json(value)
            .send()
            .await?
            .error_for_status()?;

        let pinned: PinResponse = response.json().await?;
        let cid = pinned
            .cid
            .or_else(|| pinned.uri.map(|uri| uri.trim_start_matches(IPFS_SCHEME).to_string()))
            .filter(|cid| !cid.is_empty())
            .ok_or_else(|| SdkError::Remote("Pin response has no CID".to_string()))?;

        tracing::info!(cid = %cid, "Pinned document");
        Ok(cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_url() {
        let client = IpfsClient::new(&IpfsConfig {
            gateway_url: "https://gateway.example/".into(),
            ..IpfsConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.gateway_url("ipfs://bafyabc"),
            "https://gateway.example/ipfs/bafyabc"
        );
        assert_eq!(client.gateway_url("bafyabc"), "https://gateway.example/ipfs/bafyabc");
    }

    #[tokio::test]
    async fn test_pin_requires_url() {
        let client = IpfsClient::new(&IpfsConfig::default()).unwrap();
        let err = client.pin_json(&serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("No pin URL"));
    }
}
