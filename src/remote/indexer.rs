//! GraphQL indexer client.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::config::schema::IndexerConfig;
use crate::error::{SdkError, SdkResult};

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// Fetches indexed protocol data over GraphQL.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    http: reqwest::Client,
    url: Url,
}

impl IndexerClient {
    pub fn new(url: &str, timeout: Duration) -> SdkResult<Self> {
        let url = Url::parse(url).map_err(|e| SdkError::Remote(format!("Invalid indexer URL: {}", e)))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }

    /// `None` when no indexer URL is configured.
    pub fn from_config(config: &IndexerConfig) -> SdkResult<Option<Self>> {
        config
            .url
            .as_deref()
            .map(|url| Self::new(url, Duration::from_secs(config.timeout_secs)))
            .transpose()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Run `query` and deserialize its `data`.
    pub async fn fetch<T: DeserializeOwned>(&self, query: &str, variables: Value) -> SdkResult<T> {
        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?
            .error_for_status()?;

        let body: GraphqlResponse<T> = response.json().await?;
        if !body.errors.is_empty() {
            let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
            tracing::warn!(url = %self.url, errors = ?messages, "Indexer returned errors");
            return Err(SdkError::Remote(messages.join("; ")));
        }

        body.data
            .ok_or_else(|| SdkError::Remote("Indexer response has no data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        assert!(IndexerClient::from_config(&IndexerConfig::default())
            .unwrap()
            .is_none());

        let config = IndexerConfig {
            url: Some("https://indexer.example/graphql".into()),
            ..IndexerConfig::default()
        };
        let client = IndexerClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.url().path(), "/graphql");

        let config = IndexerConfig {
            url: Some("not a url".into()),
            ..IndexerConfig::default()
        };
        assert!(IndexerClient::from_config(&config).is_err());
    }

    #[test]
    fn test_graphql_errors_parse() {
        let body: GraphqlResponse<Value> =
            serde_json::from_str(r#"{"data":null,"errors":[{"message":"bad field"}]}"#).unwrap();
        assert!(body.data.is_none());
        assert_eq!(body.errors[0].message, "bad field");
    }
}
