//! Client for the PRISM challenge service.

use crate::core::config::PrismProviderConfig;
use crate::core::price::{FetchError, decode_response};
use crate::providers::retry::RetryExecutor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const API_KEY_HEADER: &str = "X-API-Code";

/// One client request as served by `GET /prism`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Challenge {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Challenge {
    pub fn is_finished(&self) -> bool {
        self.status.as_deref() == Some("finished")
    }
}

/// Accepts both `"id": "abc"` and `"id": 42`.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Investment {
    pub ticker: String,
    pub shares: u64,
    pub price: f64,
}

#[derive(Debug, Serialize)]
struct Submission<'a> {
    id: &'a str,
    investments: &'a [Investment],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl SubmitResult {
    pub fn is_accepted(&self) -> bool {
        self.status == "correct"
    }
}

pub struct PrismClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    retry: Arc<RetryExecutor>,
}

impl PrismClient {
    pub fn new(
        config: &PrismProviderConfig,
        timeout: Duration,
        retry: Arc<RetryExecutor>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("prism-bot/0.1")
            .timeout(timeout)
            .build()?;
        Ok(PrismClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
            retry,
        })
    }

    fn with_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    #[instrument(name = "PrismChallenge", skip(self))]
    pub async fn next_challenge(&self) -> Result<Challenge, FetchError> {
        let url = format!("{}/prism", self.base_url);
        debug!("Requesting challenge from {}", url);
        let url = &url;
        self.retry
            .execute("prism", || async move {
                let response = self.with_key(self.client.get(url.as_str())).send().await?;
                decode_response(response, "challenge").await
            })
            .await
    }

    #[instrument(name = "PrismSubmit", skip(self, investments), fields(positions = investments.len()))]
    pub async fn submit(
        &self,
        id: &str,
        investments: &[Investment],
    ) -> Result<SubmitResult, FetchError> {
        let url = format!("{}/prism/solve", self.base_url);
        let body = Submission { id, investments };
        let (url, body) = (&url, &body);
        self.retry
            .execute("prism/solve", || async move {
                let response = self
                    .with_key(self.client.post(url.as_str()))
                    .json(body)
                    .send()
                    .await?;
                decode_response(response, "solution").await
            })
            .await
    }
}
