use crate::core::price::{FetchError, PriceProvider, decode_response};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Deserialize, Debug)]
struct QuoteItem {
    ticker: Option<String>,
    last: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct HistoryBar {
    open: f64,
}

/// Market-data provider backed by the LIMEX quotes and history endpoints.
pub struct LimexProvider {
    base_url: String,
    client: reqwest::Client,
}

impl LimexProvider {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("prism-bot/0.1")
            .timeout(timeout)
            .build()?;
        Ok(LimexProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl PriceProvider for LimexProvider {
    #[instrument(name = "LimexQuote", skip(self), fields(ticker = %ticker))]
    async fn fetch_current(&self, ticker: &str) -> Result<f64, FetchError> {
        let url = format!("{}/marketdata/quotes", self.base_url);
        debug!("Requesting quote from {}", url);

        let response = self.client.post(&url).json(&[ticker]).send().await?;
        let quotes: Vec<QuoteItem> = decode_response(response, ticker).await?;

        quotes
            .into_iter()
            .find(|q| q.ticker.as_deref() == Some(ticker))
            .and_then(|q| q.last)
            .filter(|price| *price > 0.0)
            .ok_or_else(|| FetchError::NoData(ticker.to_string()))
    }

    #[instrument(name = "LimexHistory", skip(self), fields(ticker = %ticker, date = %date))]
    async fn fetch_historical(&self, ticker: &str, date: NaiveDate) -> Result<f64, FetchError> {
        let start = date.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end = start + SECONDS_PER_DAY;
        let url = format!("{}/marketdata/history", self.base_url);
        debug!("Requesting history from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("ticker", ticker.to_string()),
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await?;
        let bars: Vec<HistoryBar> = decode_response(response, ticker).await?;

        bars.first()
            .map(|bar| bar.open)
            .filter(|price| *price > 0.0)
            .ok_or_else(|| FetchError::NoData(format!("{ticker} on {date}")))
    }
}
