use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Whole shares `amount` buys at `price`, or `None` if that is zero or
/// not representable as a share count.
pub fn whole_shares(amount: f64, price: f64) -> Option<u64> {
    let shares = (amount / price).floor();
    if !shares.is_finite() || shares < 1.0 || shares >= u64::MAX as f64 {
        return None;
    }
    Some(shares as u64)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub ticker: String,
    pub shares: u64,
}

/// Ordered share counts, at most one position per ticker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    positions: Vec<Position>,
}

impl Allocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a position, or adds to the existing one for `ticker`.
    pub fn push(&mut self, ticker: &str, shares: u64) {
        if self.shares_of(ticker).is_some() {
            self.add_shares(ticker, shares);
        } else {
            self.positions.push(Position {
                ticker: ticker.to_string(),
                shares,
            });
        }
    }

    /// Adds shares to an existing position.
    ///
    /// Returns false if `ticker` is not held or the new count would overflow,
    /// in which case the position is unchanged.
    pub fn add_shares(&mut self, ticker: &str, shares: u64) -> bool {
        let Some(position) = self.positions.iter_mut().find(|p| p.ticker == ticker) else {
            return false;
        };
        match position.shares.checked_add(shares) {
            Some(total) => {
                position.shares = total;
                true
            }
            None => {
                warn!(ticker, held = position.shares, shares, "Share count overflow");
                false
            }
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn shares_of(&self, ticker: &str) -> Option<u64> {
        self.positions
            .iter()
            .find(|p| p.ticker == ticker)
            .map(|p| p.shares)
    }

    pub fn tickers(&self) -> Vec<String> {
        self.positions.iter().map(|p| p.ticker.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of `shares * price`, or `None` if any held ticker is unpriced.
    pub fn total_cost(&self, prices: &HashMap<String, f64>) -> Option<f64> {
        self.positions
            .iter()
            .map(|p| prices.get(&p.ticker).map(|price| price * p.shares as f64))
            .sum()
    }
}

impl<'a> IntoIterator for &'a Allocation {
    type Item = &'a Position;
    type IntoIter = std::slice::Iter<'a, Position>;

    fn into_iter(self) -> Self::IntoIter {
        self.positions.iter()
    }
}
