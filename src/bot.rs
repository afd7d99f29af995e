//! The challenge pipeline and the main service loop.

use crate::cli::{report, ui};
use crate::core::cache::PriceCache;
use crate::core::config::AppConfig;
use crate::portfolio::{Allocation, Allocator, BudgetOptimizer, Strategy, validate};
use crate::preferences::{self, SkipReason};
use crate::prism::{Challenge, Investment, PrismClient};
use crate::providers::{LimexProvider, PriceFetcher, RetryExecutor, RetryPolicy};
use crate::store;
use crate::tracker::PerformanceTracker;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Progress lines and cache sweeps happen every this many challenges.
const REPORT_EVERY: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeOutcome {
    Skipped(SkipReason),
    /// `accepted` is `None` when the submission itself failed.
    Submitted {
        strategy: Strategy,
        accepted: Option<bool>,
    },
}

pub struct Bot {
    config: AppConfig,
    prism: PrismClient,
    fetcher: PriceFetcher,
    allocator: Allocator,
    optimizer: BudgetOptimizer,
    tracker: PerformanceTracker,
    progress: bool,
}

impl Bot {
    pub fn new(config: AppConfig, prism: PrismClient, fetcher: PriceFetcher) -> Self {
        let allocator = Allocator::new(config.stocks.clone(), config.budget.initial_usage);
        let optimizer = BudgetOptimizer::new(config.budget.target_usage);
        Self {
            config,
            prism,
            fetcher,
            allocator,
            optimizer,
            tracker: PerformanceTracker::new(),
            progress: false,
        }
    }

    /// Wires the durable store, cache, retry policy and both remote clients.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store = store::open(&config)?;
        let cache = Arc::new(PriceCache::new(
            store,
            config.ttl(),
            config.cache.flush_every,
        ));
        let retry = Arc::new(RetryExecutor::new(RetryPolicy::from(&config.retry)));
        let limex = LimexProvider::new(&config.providers.limex.base_url, config.timeout())?;
        let prism = PrismClient::new(
            &config.providers.prism,
            config.timeout(),
            Arc::clone(&retry),
        )?;
        let fetcher = PriceFetcher::new(Arc::new(limex), cache, retry, config.fetch.workers);
        Ok(Self::new(config, prism, fetcher))
    }

    /// Shows a progress bar while fetching prices.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    pub fn fetcher(&self) -> &PriceFetcher {
        &self.fetcher
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn universe_tickers(&self) -> Vec<String> {
        self.config.stocks.iter().map(|s| s.ticker.clone()).collect()
    }

    async fn fetch_prices(
        &self,
        tickers: &[String],
        date: Option<NaiveDate>,
    ) -> HashMap<String, f64> {
        if !self.progress {
            return self.fetcher.fetch_many(tickers, date).await;
        }
        let pb = ui::new_progress_bar(tickers.len() as u64, true);
        pb.set_message(match date {
            Some(d) => format!("Historical prices ({d})"),
            None => "Current prices".to_string(),
        });
        let prices = self
            .fetcher
            .fetch_many_with_progress(tickers, date, &|| pb.inc(1))
            .await;
        pb.finish_and_clear();
        prices
    }

    /// Fetches current prices for the whole universe into the cache.
    pub async fn prewarm(&self) -> HashMap<String, f64> {
        let tickers = self.universe_tickers();
        info!(count = tickers.len(), "Pre-warming current prices");
        let prices = self.fetch_prices(&tickers, None).await;
        info!("Cached {}/{} current prices", prices.len(), tickers.len());
        prices
    }

    fn skip(&mut self, challenge: &Challenge, reason: SkipReason) -> ChallengeOutcome {
        info!(id = %challenge.id, %reason, "Skipped challenge");
        self.tracker.record_skip(reason);
        ChallengeOutcome::Skipped(reason)
    }

    /// Answers one challenge. Never fails; problems become a skip.
    pub async fn process_challenge(&mut self, challenge: &Challenge) -> ChallengeOutcome {
        let started = Instant::now();

        if let Some(reason) = preferences::should_skip(challenge) {
            return self.skip(challenge, reason);
        }

        let context = preferences::parse_context(challenge);
        let strategy = self.config.strategy.select(context.preference_strength);
        info!(
            id = %challenge.id,
            budget = context.budget,
            date = %context.target_date,
            preferred = ?context.preferred_sectors,
            avoided = ?context.avoided_sectors,
            strength = context.preference_strength,
            %strategy,
            "Processing challenge"
        );

        let current = self.fetch_prices(&self.universe_tickers(), None).await;
        if current.is_empty() {
            return self.skip(challenge, SkipReason::PricesUnavailable);
        }

        let mut allocation = self.allocator.allocate(strategy, &context, &current);
        if allocation.is_empty() {
            return self.skip(challenge, SkipReason::EmptyPortfolio);
        }

        match validate(&allocation, context.budget, &current) {
            Ok(validation) => debug!("Initial: {}", validation.message()),
            Err(e) => {
                warn!(id = %challenge.id, error = %e, "Initial allocation rejected");
                return self.skip(challenge, SkipReason::ValidationFailed);
            }
        }

        self.optimizer
            .optimize(&mut allocation, context.budget, &current);
        match validate(&allocation, context.budget, &current) {
            Ok(validation) => info!(id = %challenge.id, "{}", validation.message()),
            Err(e) => {
                warn!(id = %challenge.id, error = %e, "Optimized allocation rejected");
                return self.skip(challenge, SkipReason::ValidationFailed);
            }
        }
        debug!("Allocation:\n{}", report::allocation_table(&allocation, &current));

        let historical = self
            .fetch_prices(&allocation.tickers(), Some(context.target_date))
            .await;
        let investments = investments(&allocation, &historical);
        if investments.is_empty() {
            return self.skip(challenge, SkipReason::NoHistoricalPrices);
        }
        if investments.len() < allocation.len() {
            warn!(
                id = %challenge.id,
                "Historical prices found for {}/{} tickers",
                investments.len(),
                allocation.len()
            );
        }

        self.tracker.record_processed(strategy);
        let accepted = match self.prism.submit(&challenge.id, &investments).await {
            Ok(result) => {
                let accepted = result.is_accepted();
                let message = result.message.as_deref().unwrap_or_default();
                if accepted {
                    info!(id = %challenge.id, "Solution accepted: {message}");
                } else {
                    warn!(id = %challenge.id, status = %result.status, "Solution rejected: {message}");
                }
                self.tracker.record_solution(accepted);
                Some(accepted)
            }
            Err(e) => {
                warn!(id = %challenge.id, error = %e, "Submission failed");
                None
            }
        };

        let elapsed = started.elapsed();
        self.tracker.record_processing_time(elapsed);
        debug!(id = %challenge.id, "Processed in {:.2}s", elapsed.as_secs_f64());

        ChallengeOutcome::Submitted { strategy, accepted }
    }

    /// Serves challenges until the service reports `finished` or stops answering.
    ///
    /// The historical cache is flushed on every exit path.
    pub async fn run(&mut self) -> Result<()> {
        let _flush = self.fetcher.cache().flush_guard();
        self.prewarm().await;

        let delay = Duration::from_millis(self.config.loop_delay_ms);
        loop {
            let challenge = match self.prism.next_challenge().await {
                Ok(challenge) => challenge,
                Err(e) => {
                    warn!(error = %e, "No challenge available, stopping");
                    break;
                }
            };
            if challenge.is_finished() {
                info!("All challenges completed");
                break;
            }

            self.process_challenge(&challenge).await;

            let total = self.tracker.total();
            if total > 0 && total % REPORT_EVERY == 0 {
                info!("{}", self.tracker.quick_stats());
                let evicted = self.fetcher.cache().sweep_expired();
                debug!(evicted, "Swept expired current prices");
            }
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        self.tracker.display_as_table(
            &self.fetcher.retry().stats(),
            &self.fetcher.cache().stats(),
        )
    }
}

/// Pairs each position with its historical price, dropping unpriced tickers.
fn investments(allocation: &Allocation, historical: &HashMap<String, f64>) -> Vec<Investment> {
    allocation
        .positions()
        .iter()
        .filter_map(|p| {
            historical.get(&p.ticker).map(|price| Investment {
                ticker: p.ticker.clone(),
                shares: p.shares,
                price: *price,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PrismProviderConfig;
    use crate::core::stock::Stock;
    use crate::store::MemoryStore;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> AppConfig {
        AppConfig {
            stocks: vec![
                Stock::new("AAPL", "Technology"),
                Stock::new("WMT", "Consumer Defensive"),
            ],
            loop_delay_ms: 0,
            ..AppConfig::default()
        }
    }

    fn bot(server: &MockServer) -> Bot {
        let config = config();
        let retry = Arc::new(RetryExecutor::new(RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
        }));
        let cache = Arc::new(PriceCache::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(60),
            10,
        ));
        let limex = LimexProvider::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let prism = PrismClient::new(
            &PrismProviderConfig {
                base_url: server.uri(),
                api_key: None,
            },
            Duration::from_secs(5),
            Arc::clone(&retry),
        )
        .unwrap();
        let fetcher = PriceFetcher::new(Arc::new(limex), cache, retry, 4);
        Bot::new(config, prism, fetcher)
    }

    async fn mount_quotes(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/marketdata/quotes"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"ticker": "AAPL", "last": 100.0}, {"ticker": "WMT", "last": 50.0}]"#,
            ))
            .mount(server)
            .await;
    }

    fn challenge(message: &str) -> Challenge {
        Challenge {
            id: "c-1".to_string(),
            message: message.to_string(),
            start_date: Some("2021-03-05".to_string()),
            status: None,
        }
    }

    #[tokio::test]
    async fn test_high_conviction_submission() {
        let server = MockServer::start().await;
        mount_quotes(&server).await;
        Mock::given(method("GET"))
            .and(path("/marketdata/history"))
            .and(query_param("ticker", "AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"open": 120.0}]"#))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/prism/solve"))
            .and(body_partial_json(serde_json::json!({
                "id": "c-1",
                "investments": [{"ticker": "AAPL", "shares": 2, "price": 120.0}]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"status": "correct"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut bot = bot(&server);
        let outcome = bot
            .process_challenge(&challenge("I have $300 and love tech"))
            .await;

        assert_eq!(
            outcome,
            ChallengeOutcome::Submitted {
                strategy: Strategy::HighConviction,
                accepted: Some(true),
            }
        );
        assert_eq!(bot.tracker().accepted, 1);
        assert_eq!(bot.tracker().processed, 1);
    }

    #[tokio::test]
    async fn test_filtered_challenge_makes_no_calls() {
        let server = MockServer::start().await;
        let mut bot = bot(&server);

        let outcome = bot.process_challenge(&challenge("Surprise me")).await;

        assert_eq!(outcome, ChallengeOutcome::Skipped(SkipReason::NoBudget));
        assert_eq!(bot.fetcher().retry().stats().total_calls, 0);
        assert_eq!(bot.tracker().skipped, 1);
    }

    #[tokio::test]
    async fn test_missing_history_abandons_challenge() {
        let server = MockServer::start().await;
        mount_quotes(&server).await;
        Mock::given(method("GET"))
            .and(path("/marketdata/history"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/prism/solve"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut bot = bot(&server);
        let outcome = bot
            .process_challenge(&challenge("I have $300 and love tech"))
            .await;

        assert_eq!(
            outcome,
            ChallengeOutcome::Skipped(SkipReason::NoHistoricalPrices)
        );
        assert_eq!(bot.tracker().processed, 0);
    }

    #[tokio::test]
    async fn test_unreachable_market_data_skips() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/marketdata/quotes"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut bot = bot(&server);
        let outcome = bot
            .process_challenge(&challenge("I have $300 and love tech"))
            .await;

        assert_eq!(
            outcome,
            ChallengeOutcome::Skipped(SkipReason::PricesUnavailable)
        );
    }

    #[test]
    fn test_investments_drop_unpriced() {
        let mut allocation = Allocation::new();
        allocation.push("AAPL", 2);
        allocation.push("WMT", 3);
        let historical = HashMap::from([("WMT".to_string(), 40.0)]);

        let result = investments(&allocation, &historical);

        assert_eq!(
            result,
            vec![Investment {
                ticker: "WMT".to_string(),
                shares: 3,
                price: 40.0
            }]
        );
    }
}
