use super::allocation::Allocation;
use std::collections::HashMap;
use thiserror::Error;

/// Cost may exceed the budget by this fraction before it counts as a breach.
pub const BUDGET_TOLERANCE: f64 = 0.01;
/// Usage below this percentage is accepted but flagged.
pub const LOW_USAGE_PCT: f64 = 85.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Portfolio is empty")]
    Empty,
    #[error("Invalid budget: {0}")]
    InvalidBudget(f64),
    #[error("Missing price for {0}")]
    MissingPrice(String),
    #[error("Invalid share count for {ticker}: {shares}")]
    InvalidShares { ticker: String, shares: u64 },
    #[error("Budget exceeded: ${cost:.2} > ${limit:.2}")]
    BudgetExceeded { cost: f64, limit: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub cost: f64,
    pub usage_pct: f64,
}

impl Validation {
    pub fn is_low_usage(&self) -> bool {
        self.usage_pct < LOW_USAGE_PCT
    }

    pub fn message(&self) -> String {
        if self.is_low_usage() {
            format!(
                "Low budget usage: {:.1}% (${:.2})",
                self.usage_pct, self.cost
            )
        } else {
            format!("Valid: {:.1}% usage (${:.2})", self.usage_pct, self.cost)
        }
    }
}

/// Checks an allocation against the budget.
///
/// Rejects empty allocations, unpriced tickers, zero share counts and any
/// cost above `budget * (1 + BUDGET_TOLERANCE)`. Low usage is reported
/// through [`Validation::is_low_usage`] rather than rejected.
pub fn validate(
    allocation: &Allocation,
    budget: f64,
    prices: &HashMap<String, f64>,
) -> Result<Validation, ValidationError> {
    if allocation.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !(budget.is_finite() && budget > 0.0) {
        return Err(ValidationError::InvalidBudget(budget));
    }

    let mut cost = 0.0;
    for position in allocation {
        let price = prices
            .get(&position.ticker)
            .ok_or_else(|| ValidationError::MissingPrice(position.ticker.clone()))?;
        if position.shares == 0 {
            return Err(ValidationError::InvalidShares {
                ticker: position.ticker.clone(),
                shares: position.shares,
            });
        }
        cost += price * position.shares as f64;
    }

    let limit = budget * (1.0 + BUDGET_TOLERANCE);
    if cost > limit {
        return Err(ValidationError::BudgetExceeded { cost, limit });
    }

    Ok(Validation {
        cost,
        usage_pct: cost / budget * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices() -> HashMap<String, f64> {
        [("AAPL", 100.0), ("KO", 50.0)]
            .into_iter()
            .map(|(t, p)| (t.to_string(), p))
            .collect()
    }

    fn allocation(positions: &[(&str, u64)]) -> Allocation {
        let mut allocation = Allocation::new();
        for (ticker, shares) in positions {
            allocation.push(ticker, *shares);
        }
        allocation
    }

    #[test]
    fn test_empty_is_rejected() {
        let err = validate(&Allocation::new(), 100.0, &prices()).unwrap_err();
        assert_eq!(err, ValidationError::Empty);
        assert_eq!(err.to_string(), "Portfolio is empty");
    }

    #[test]
    fn test_missing_price_is_rejected() {
        let err = validate(&allocation(&[("MSFT", 1)]), 1000.0, &prices()).unwrap_err();
        assert_eq!(err, ValidationError::MissingPrice("MSFT".to_string()));
    }

    #[test]
    fn test_zero_shares_are_rejected() {
        let err = validate(&allocation(&[("AAPL", 0)]), 1000.0, &prices()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidShares { shares: 0, .. }));
    }

    #[test]
    fn test_tolerance_band() {
        // $1000 on a $995 budget is inside the 1% band.
        let slightly_over = allocation(&[("AAPL", 9), ("KO", 2)]);
        let result = validate(&slightly_over, 995.0, &prices()).unwrap();
        assert_eq!(result.cost, 1000.0);
        assert!(result.usage_pct > 100.0);

        let over = allocation(&[("AAPL", 10), ("KO", 1)]);
        let err = validate(&over, 1000.0, &prices()).unwrap_err();
        assert_eq!(err.to_string(), "Budget exceeded: $1050.00 > $1010.00");
    }

    #[test]
    fn test_low_usage_is_flagged_not_rejected() {
        let result = validate(&allocation(&[("AAPL", 8)]), 1000.0, &prices()).unwrap();
        assert_eq!(result.cost, 800.0);
        assert!(result.is_low_usage());
        assert!(result.message().starts_with("Low budget usage: 80.0%"));

        let result = validate(&allocation(&[("AAPL", 8), ("KO", 1)]), 1000.0, &prices()).unwrap();
        assert!(!result.is_low_usage());
        assert_eq!(result.usage_pct, 85.0);
    }
}
