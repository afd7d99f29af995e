//! Pricing abstractions and the remote-call error taxonomy

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure of a single remote call.
///
/// Only [`FetchError::Timeout`] and [`FetchError::Connect`] are transient;
/// everything else aborts a retry loop immediately.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP error: {status} for {target}")]
    Status { status: u16, target: String },

    #[error("failed to decode response for {target}: {message}")]
    Decode { target: String, message: String },

    #[error("no price data for {0}")]
    NoData(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout(_) | FetchError::Connect(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_decode() {
            FetchError::Decode {
                target: e
                    .url()
                    .map_or_else(|| "response".to_string(), |u| u.to_string()),
                message: e.to_string(),
            }
        } else if let Some(status) = e.status() {
            FetchError::Status {
                status: status.as_u16(),
                target: e
                    .url()
                    .map_or_else(|| "request".to_string(), |u| u.to_string()),
            }
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// Checks the status and decodes a JSON body, naming `target` in errors.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
    target: &str,
) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            target: target.to_string(),
        });
    }
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| FetchError::Decode {
        target: target.to_string(),
        message: e.to_string(),
    })
}

/// Single-item price lookups against a market-data source.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_current(&self, ticker: &str) -> Result<f64, FetchError>;

    async fn fetch_historical(&self, ticker: &str, date: NaiveDate) -> Result<f64, FetchError>;
}
