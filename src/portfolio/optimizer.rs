use super::allocation::{Allocation, whole_shares};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Greedy top-up pass that moves an allocation towards `target_usage` of budget.
#[derive(Debug, Clone, Copy)]
pub struct BudgetOptimizer {
    target_usage: f64,
}

impl BudgetOptimizer {
    pub fn new(target_usage: f64) -> Self {
        Self { target_usage }
    }

    /// Adds whole shares to held tickers, cheapest first, in a single pass.
    ///
    /// Stops once the remainder is below the cheapest price in `prices`.
    /// Returns the number of shares added.
    pub fn optimize(
        &self,
        allocation: &mut Allocation,
        budget: f64,
        prices: &HashMap<String, f64>,
    ) -> u64 {
        let Some(current) = allocation.total_cost(prices) else {
            warn!("Allocation holds an unpriced ticker, skipping optimization");
            return 0;
        };
        let mut remaining = budget * self.target_usage - current;
        if remaining < 0.0 {
            return 0;
        }

        let cheapest = prices
            .values()
            .copied()
            .filter(|p| *p > 0.0)
            .fold(f64::INFINITY, f64::min);

        let mut held: Vec<(String, f64)> = allocation
            .positions()
            .iter()
            .filter_map(|p| prices.get(&p.ticker).map(|price| (p.ticker.clone(), *price)))
            .filter(|(_, price)| *price > 0.0)
            .collect();
        held.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut added = 0;
        for (ticker, price) in held {
            if let Some(extra) = whole_shares(remaining, price) {
                if allocation.add_shares(&ticker, extra) {
                    remaining -= extra as f64 * price;
                    added += extra;
                }
            }
            if remaining < cheapest {
                break;
            }
        }

        debug!(added, remaining, "Optimized allocation");
        added
    }
}
