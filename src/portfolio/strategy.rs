//! Strategy selection and the greedy allocators behind each strategy.
//!
//! All three strategies follow the same pattern: drop avoided and unpriced
//! stocks, split the rest into pools, sort each pool cheapest first, pick a
//! bounded number of tickers per pool (with a per-sector cap where the
//! strategy has one), spread the pool's sub-budget evenly across the picks
//! and floor each share to a whole share count. Zero-share picks are dropped.

use super::allocation::{Allocation, whole_shares};
use crate::core::context::ClientContext;
use crate::core::stock::Stock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use tracing::{debug, warn};

/// Preferred / other budget fractions for the preference-weighted strategy.
pub const PREFERENCE_WEIGHTED_SPLIT: (f64, f64) = (0.60, 0.36);
/// Preferred / other budget fractions for the high-conviction strategy.
pub const HIGH_CONVICTION_SPLIT: (f64, f64) = (0.80, 0.16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Diversification,
    PreferenceWeighted,
    HighConviction,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::Diversification,
        Strategy::PreferenceWeighted,
        Strategy::HighConviction,
    ];
}

impl Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Strategy::Diversification => "Diversification",
                Strategy::PreferenceWeighted => "Preference Weighted",
                Strategy::HighConviction => "High Conviction",
            }
        )
    }
}

/// Closed range of preference strengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub min: u8,
    pub max: u8,
}

impl Band {
    pub fn contains(&self, strength: u8) -> bool {
        self.min <= strength && strength <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyBands {
    pub diversification: Band,
    pub preference_weighted: Band,
    pub high_conviction: Band,
}

impl Default for StrategyBands {
    fn default() -> Self {
        Self {
            diversification: Band { min: 0, max: 30 },
            preference_weighted: Band { min: 31, max: 60 },
            high_conviction: Band { min: 61, max: 100 },
        }
    }
}

impl StrategyBands {
    fn bands(&self) -> [(Strategy, Band); 3] {
        [
            (Strategy::Diversification, self.diversification),
            (Strategy::PreferenceWeighted, self.preference_weighted),
            (Strategy::HighConviction, self.high_conviction),
        ]
    }

    /// Picks the strategy whose band contains `strength`.
    ///
    /// Falls back to diversification for strengths no band covers, which
    /// only happens for out-of-range input.
    pub fn select(&self, strength: u8) -> Strategy {
        match self
            .bands()
            .into_iter()
            .find(|(_, band)| band.contains(strength))
        {
            Some((strategy, _)) => strategy,
            None => {
                warn!(strength, "No strategy band covers strength, using diversification");
                Strategy::Diversification
            }
        }
    }

    /// Checks the bands are well formed, disjoint and cover 0..=100.
    pub fn validate(&self) -> Result<(), String> {
        for (strategy, band) in self.bands() {
            if band.min > band.max {
                return Err(format!(
                    "{strategy} band is empty ({}..={})",
                    band.min, band.max
                ));
            }
        }
        for strength in 0..=100u8 {
            let matching: Vec<Strategy> = self
                .bands()
                .into_iter()
                .filter(|(_, band)| band.contains(strength))
                .map(|(strategy, _)| strategy)
                .collect();
            match matching.len() {
                1 => {}
                0 => return Err(format!("strength {strength} is not covered")),
                _ => {
                    return Err(format!(
                        "strength {strength} is covered by {matching:?}"
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    stock: &'a Stock,
    price: f64,
}

/// Builds initial allocations over a fixed stock universe.
#[derive(Debug, Clone)]
pub struct Allocator {
    universe: Vec<Stock>,
    initial_usage: f64,
}

impl Allocator {
    pub fn new(universe: Vec<Stock>, initial_usage: f64) -> Self {
        Self {
            universe,
            initial_usage,
        }
    }

    pub fn allocate(
        &self,
        strategy: Strategy,
        context: &ClientContext,
        prices: &HashMap<String, f64>,
    ) -> Allocation {
        let candidates = self.candidates(context, prices);
        let allocation = match strategy {
            Strategy::Diversification => self.diversification(context, &candidates),
            Strategy::PreferenceWeighted => preference_weighted(context, &candidates),
            Strategy::HighConviction => high_conviction(context, &candidates),
        };
        debug!(
            %strategy,
            candidates = candidates.len(),
            positions = allocation.len(),
            "Built allocation"
        );
        allocation
    }

    /// Priced, non-avoided stocks, cheapest first.
    fn candidates(
        &self,
        context: &ClientContext,
        prices: &HashMap<String, f64>,
    ) -> Vec<Candidate<'_>> {
        let mut candidates: Vec<Candidate> = self
            .universe
            .iter()
            .filter(|stock| !context.is_avoided(&stock.sector))
            .filter_map(|stock| {
                prices
                    .get(&stock.ticker)
                    .copied()
                    .filter(|price| price.is_finite() && *price > 0.0)
                    .map(|price| Candidate { stock, price })
            })
            .collect();
        candidates.sort_by(|a, b| a.price.total_cmp(&b.price));
        candidates
    }

    fn diversification(&self, context: &ClientContext, candidates: &[Candidate]) -> Allocation {
        let target = diversification_target(context.budget);
        let cap = (target / 2).max(2);
        let selected = select_capped(candidates, target, cap);

        let mut allocation = Allocation::new();
        if selected.is_empty() {
            return allocation;
        }
        let per_stock = context.budget * self.initial_usage / selected.len() as f64;
        for candidate in selected {
            buy(&mut allocation, candidate, per_stock);
        }
        allocation
    }
}

/// Number of stocks the diversification strategy aims for at a given budget.
pub fn diversification_target(budget: f64) -> usize {
    if budget < 100.0 {
        3
    } else if budget < 500.0 {
        5
    } else {
        7
    }
}

fn select_capped<'a>(
    candidates: &[Candidate<'a>],
    target: usize,
    per_sector: usize,
) -> Vec<Candidate<'a>> {
    let mut selected = Vec::with_capacity(target);
    let mut sector_counts: HashMap<&str, usize> = HashMap::new();
    for candidate in candidates {
        if selected.len() >= target {
            break;
        }
        let count = sector_counts
            .entry(candidate.stock.sector.as_str())
            .or_default();
        if *count < per_sector {
            *count += 1;
            selected.push(*candidate);
        }
    }
    selected
}

fn split_pools<'a>(
    context: &ClientContext,
    candidates: &[Candidate<'a>],
) -> (Vec<Candidate<'a>>, Vec<Candidate<'a>>) {
    candidates
        .iter()
        .partition(|c| context.is_preferred(&c.stock.sector))
}

/// Buys as many whole shares as `budget` affords. Returns false if none.
fn buy(allocation: &mut Allocation, candidate: Candidate, budget: f64) -> bool {
    let Some(shares) = whole_shares(budget, candidate.price) else {
        return false;
    };
    allocation.push(&candidate.stock.ticker, shares);
    true
}

/// Even split over the `max` cheapest tickers of a pool, no sector cap.
fn buy_cheapest(allocation: &mut Allocation, pool: &[Candidate], max: usize, budget: f64) {
    let count = pool.len().min(max);
    if count == 0 {
        return;
    }
    let per_stock = budget / count as f64;
    for candidate in &pool[..count] {
        buy(allocation, *candidate, per_stock);
    }
}

fn preference_weighted(context: &ClientContext, candidates: &[Candidate]) -> Allocation {
    let (preferred, other) = split_pools(context, candidates);
    let (preferred_share, other_share) = PREFERENCE_WEIGHTED_SPLIT;
    let mut allocation = Allocation::new();

    buy_cheapest(
        &mut allocation,
        &preferred,
        3,
        context.budget * preferred_share,
    );

    // One ticker per sector; a pick only counts once it buys at least one share.
    let target = other.len().min(3);
    if target > 0 {
        let per_stock = context.budget * other_share / target as f64;
        let mut bought = 0;
        let mut used_sectors: Vec<&str> = Vec::new();
        for candidate in &other {
            if bought >= target {
                break;
            }
            let sector = candidate.stock.sector.as_str();
            if used_sectors.contains(&sector) {
                continue;
            }
            if buy(&mut allocation, *candidate, per_stock) {
                used_sectors.push(sector);
                bought += 1;
            }
        }
    }
    allocation
}

fn high_conviction(context: &ClientContext, candidates: &[Candidate]) -> Allocation {
    let (preferred, other) = split_pools(context, candidates);
    let (preferred_share, other_share) = HIGH_CONVICTION_SPLIT;
    let mut allocation = Allocation::new();

    buy_cheapest(
        &mut allocation,
        &preferred,
        4,
        context.budget * preferred_share,
    );
    buy_cheapest(&mut allocation, &other, 1, context.budget * other_share);
    allocation
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::{BTreeSet, HashSet};

    fn context(budget: f64, preferred: &[&str], avoided: &[&str], strength: u8) -> ClientContext {
        ClientContext {
            budget,
            target_date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            preferred_sectors: preferred.iter().map(|s| s.to_string()).collect(),
            avoided_sectors: avoided.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            preference_strength: strength,
        }
    }

    fn market(stocks: &[(&str, &str, f64)]) -> (Vec<Stock>, HashMap<String, f64>) {
        let universe = stocks.iter().map(|(t, s, _)| Stock::new(t, s)).collect();
        let prices = stocks
            .iter()
            .map(|(t, _, p)| (t.to_string(), *p))
            .collect();
        (universe, prices)
    }

    fn sectors_of(allocation: &Allocation, universe: &[Stock]) -> Vec<String> {
        allocation
            .positions()
            .iter()
            .map(|p| {
                universe
                    .iter()
                    .find(|s| s.ticker == p.ticker)
                    .unwrap()
                    .sector
                    .clone()
            })
            .collect()
    }

    #[test]
    fn test_band_selection_is_total_and_exclusive() {
        let bands = StrategyBands::default();
        assert!(bands.validate().is_ok());
        for strength in 0..=100u8 {
            let matches = Strategy::ALL
                .iter()
                .filter(|s| {
                    bands
                        .bands()
                        .iter()
                        .any(|(strategy, band)| strategy == *s && band.contains(strength))
                })
                .count();
            assert_eq!(matches, 1, "strength {strength}");
        }
        assert_eq!(bands.select(0), Strategy::Diversification);
        assert_eq!(bands.select(30), Strategy::Diversification);
        assert_eq!(bands.select(31), Strategy::PreferenceWeighted);
        assert_eq!(bands.select(60), Strategy::PreferenceWeighted);
        assert_eq!(bands.select(61), Strategy::HighConviction);
        assert_eq!(bands.select(100), Strategy::HighConviction);
    }

    #[test]
    fn test_out_of_range_strength_falls_back() {
        assert_eq!(
            StrategyBands::default().select(150),
            Strategy::Diversification
        );
    }

    #[test]
    fn test_validate_detects_gaps() {
        let bands = StrategyBands {
            preference_weighted: Band { min: 32, max: 60 },
            ..StrategyBands::default()
        };
        assert_eq!(
            bands.validate(),
            Err("strength 31 is not covered".to_string())
        );

        let bands = StrategyBands {
            high_conviction: Band { min: 90, max: 61 },
            ..StrategyBands::default()
        };
        assert!(bands.validate().is_err());
    }

    #[test]
    fn test_high_conviction_scenario() {
        let (universe, prices) = market(&[
            ("AAPL", "Technology", 100.0),
            ("WMT", "Consumer Defensive", 50.0),
        ]);
        let ctx = context(300.0, &["Technology"], &[], 75);
        let strategy = StrategyBands::default().select(ctx.preference_strength);
        assert_eq!(strategy, Strategy::HighConviction);

        let allocation = Allocator::new(universe, 0.96).allocate(strategy, &ctx, &prices);

        // $240 buys 2 AAPL; $48 cannot buy a $50 WMT share.
        assert_eq!(allocation.shares_of("AAPL"), Some(2));
        assert_eq!(allocation.shares_of("WMT"), None);
        assert_eq!(allocation.len(), 1);
    }

    #[test]
    fn test_diversification_respects_target_and_sector_cap() {
        let (universe, prices) = market(&[
            ("T1", "Technology", 10.0),
            ("T2", "Technology", 11.0),
            ("T3", "Technology", 12.0),
            ("T4", "Technology", 13.0),
            ("H1", "Healthcare", 20.0),
            ("H2", "Healthcare", 21.0),
            ("E1", "Energy", 30.0),
            ("U1", "Utilities", 40.0),
        ]);
        let ctx = context(1000.0, &[], &[], 0);
        let allocation =
            Allocator::new(universe.clone(), 0.96).allocate(Strategy::Diversification, &ctx, &prices);

        // Target 7, cap max(2, 3) = 3 per sector.
        assert_eq!(allocation.len(), 7);
        let tech = sectors_of(&allocation, &universe)
            .iter()
            .filter(|s| *s == "Technology")
            .count();
        assert_eq!(tech, 3);
        assert_eq!(allocation.shares_of("T4"), None);

        // 960 / 7 per stock, floored.
        assert_eq!(allocation.shares_of("T1"), Some(13));
        assert_eq!(allocation.shares_of("U1"), Some(3));
        assert!(allocation.total_cost(&prices).unwrap() <= 960.0);
    }

    #[test]
    fn test_oversized_budget_buys_nothing() {
        let (universe, prices) = market(&[("A", "Technology", 5.0), ("B", "Energy", 7.0)]);
        let allocator = Allocator::new(universe, 0.96);
        for strategy in Strategy::ALL {
            let ctx = context(1e23, &["Technology"], &[], 50);
            let allocation = allocator.allocate(strategy, &ctx, &prices);
            assert!(allocation.is_empty(), "{strategy}: {allocation:?}");
        }
    }

    #[test]
    fn test_diversification_targets_by_budget() {
        assert_eq!(diversification_target(99.99), 3);
        assert_eq!(diversification_target(100.0), 5);
        assert_eq!(diversification_target(499.0), 5);
        assert_eq!(diversification_target(500.0), 7);
    }

    #[test]
    fn test_small_budget_drops_zero_share_picks() {
        let (universe, prices) = market(&[
            ("A", "Technology", 5.0),
            ("B", "Energy", 20.0),
            ("C", "Utilities", 40.0),
        ]);
        let ctx = context(60.0, &[], &[], 10);
        let allocation =
            Allocator::new(universe, 0.96).allocate(Strategy::Diversification, &ctx, &prices);

        // 19.2 each: 3 A, 0 B (dropped), 0 C (dropped).
        assert_eq!(allocation.len(), 1);
        assert_eq!(allocation.shares_of("A"), Some(3));
    }

    #[test]
    fn test_avoided_and_unpriced_are_excluded() {
        let (universe, mut prices) = market(&[
            ("OIL", "Energy", 1.0),
            ("BANK", "Financial Services", 2.0),
            ("TECH", "Technology", 3.0),
        ]);
        prices.remove("BANK");
        let ctx = context(100.0, &["Energy"], &["Energy"], 80);

        let allocator = Allocator::new(universe, 0.96);
        for strategy in Strategy::ALL {
            let allocation = allocator.allocate(strategy, &ctx, &prices);
            assert_eq!(allocation.shares_of("OIL"), None, "{strategy}");
            assert_eq!(allocation.shares_of("BANK"), None, "{strategy}");
        }
    }

    #[test]
    fn test_preference_weighted_pools() {
        let (universe, prices) = market(&[
            ("T1", "Technology", 10.0),
            ("T2", "Technology", 20.0),
            ("T3", "Technology", 30.0),
            ("T4", "Technology", 40.0),
            ("H1", "Healthcare", 5.0),
            ("H2", "Healthcare", 6.0),
            ("E1", "Energy", 7.0),
            ("U1", "Utilities", 8.0),
        ]);
        let ctx = context(1000.0, &["Technology"], &[], 50);
        let allocation = Allocator::new(universe.clone(), 0.96).allocate(
            Strategy::PreferenceWeighted,
            &ctx,
            &prices,
        );

        // Preferred: $600 over 3 cheapest tech stocks.
        assert_eq!(allocation.shares_of("T1"), Some(20));
        assert_eq!(allocation.shares_of("T2"), Some(10));
        assert_eq!(allocation.shares_of("T3"), Some(6));
        assert_eq!(allocation.shares_of("T4"), None);

        // Other: $360 over 3, one per sector, H2 skipped.
        assert_eq!(allocation.shares_of("H1"), Some(24));
        assert_eq!(allocation.shares_of("H2"), None);
        assert_eq!(allocation.shares_of("E1"), Some(17));
        assert_eq!(allocation.shares_of("U1"), Some(15));

        let sectors = sectors_of(&allocation, &universe);
        let distinct_other: HashSet<_> = sectors.iter().filter(|s| *s != "Technology").collect();
        assert_eq!(distinct_other.len(), 3);
    }

    #[test]
    fn test_high_conviction_has_no_preferred_cap() {
        let (universe, prices) = market(&[
            ("T1", "Technology", 10.0),
            ("T2", "Technology", 10.0),
            ("T3", "Technology", 10.0),
            ("T4", "Technology", 10.0),
            ("T5", "Technology", 10.0),
            ("H1", "Healthcare", 50.0),
            ("E1", "Energy", 20.0),
        ]);
        let ctx = context(1000.0, &["Technology"], &[], 90);
        let allocation =
            Allocator::new(universe, 0.96).allocate(Strategy::HighConviction, &ctx, &prices);

        for ticker in ["T1", "T2", "T3", "T4"] {
            assert_eq!(allocation.shares_of(ticker), Some(20), "{ticker}");
        }
        assert_eq!(allocation.shares_of("T5"), None);
        // Cheapest other only.
        assert_eq!(allocation.shares_of("E1"), Some(8));
        assert_eq!(allocation.shares_of("H1"), None);
    }

    #[test]
    fn test_empty_pools_contribute_nothing() {
        let (universe, prices) = market(&[("H1", "Healthcare", 10.0)]);
        let ctx = context(1000.0, &["Technology"], &[], 50);
        let allocation = Allocator::new(universe, 0.96).allocate(
            Strategy::PreferenceWeighted,
            &ctx,
            &prices,
        );
        assert_eq!(allocation.shares_of("H1"), Some(36));
        assert_eq!(allocation.len(), 1);

        let ctx = context(1000.0, &[], &["Healthcare"], 0);
        let (universe, prices) = market(&[("H1", "Healthcare", 10.0)]);
        let allocation =
            Allocator::new(universe, 0.96).allocate(Strategy::Diversification, &ctx, &prices);
        assert!(allocation.is_empty());
    }
}
