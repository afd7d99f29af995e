use super::retry::RetryExecutor;
use crate::core::cache::PriceCache;
use crate::core::price::{FetchError, PriceProvider};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cache-first batch price lookup with a bounded pool of fetch tasks.
///
/// `date = None` resolves current prices, `Some(date)` historical ones.
/// Tickers whose fetch fails are left out of the result.
#[derive(Clone)]
pub struct PriceFetcher {
    provider: Arc<dyn PriceProvider>,
    cache: Arc<PriceCache>,
    retry: Arc<RetryExecutor>,
    workers: usize,
}

impl PriceFetcher {
    pub fn new(
        provider: Arc<dyn PriceProvider>,
        cache: Arc<PriceCache>,
        retry: Arc<RetryExecutor>,
        workers: usize,
    ) -> Self {
        Self {
            provider,
            cache,
            retry,
            workers: workers.max(1),
        }
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }

    pub fn retry(&self) -> &Arc<RetryExecutor> {
        &self.retry
    }

    pub async fn fetch_many(
        &self,
        tickers: &[String],
        date: Option<NaiveDate>,
    ) -> HashMap<String, f64> {
        self.fetch_many_with_progress(tickers, date, &|| {}).await
    }

    /// Like [`Self::fetch_many`], calling `on_done` once per resolved ticker.
    pub async fn fetch_many_with_progress(
        &self,
        tickers: &[String],
        date: Option<NaiveDate>,
        on_done: &(dyn Fn() + Send + Sync),
    ) -> HashMap<String, f64> {
        let mut prices = HashMap::with_capacity(tickers.len());
        let mut misses = Vec::new();
        let mut seen = HashSet::new();

        for ticker in tickers {
            if !seen.insert(ticker.as_str()) {
                continue;
            }
            let cached = match date {
                Some(d) => self.cache.get_historical(ticker, d),
                None => self.cache.get_current(ticker),
            };
            match cached {
                Some(price) => {
                    prices.insert(ticker.clone(), price);
                    on_done();
                }
                None => misses.push(ticker.clone()),
            }
        }

        if misses.is_empty() {
            return prices;
        }
        debug!(
            hits = prices.len(),
            misses = misses.len(),
            workers = self.workers,
            "Fetching uncached prices"
        );

        let requested = misses.len();
        let mut fetched = 0;
        let mut results = stream::iter(misses)
            .map(|ticker| {
                let this = self.clone();
                tokio::spawn(async move {
                    let result = this.fetch_one(&ticker, date).await;
                    if let Ok(price) = result {
                        match date {
                            Some(d) => this.cache.set_historical(&ticker, d, price),
                            None => this.cache.set_current(&ticker, price),
                        }
                    }
                    (ticker, result)
                })
            })
            .buffer_unordered(self.workers);

        while let Some(joined) = results.next().await {
            on_done();
            match joined {
                Ok((ticker, Ok(price))) => {
                    prices.insert(ticker, price);
                    fetched += 1;
                }
                Ok((ticker, Err(e))) => {
                    debug!(ticker = %ticker, error = %e, "Price unavailable");
                }
                Err(e) => {
                    warn!(error = %e, "Fetch task aborted");
                }
            }
        }

        info!(
            requested,
            fetched,
            kind = if date.is_some() { "historical" } else { "current" },
            "Fetched prices"
        );
        prices
    }

    async fn fetch_one(&self, ticker: &str, date: Option<NaiveDate>) -> Result<f64, FetchError> {
        let provider = &self.provider;
        self.retry
            .execute(ticker, || async move {
                match date {
                    Some(d) => provider.fetch_historical(ticker, d).await,
                    None => provider.fetch_current(ticker).await,
                }
            })
            .await
    }
}
