use super::ui;
use crate::core::cache::CacheStats;
use crate::core::stock::Stock;
use crate::portfolio::Allocation;
use crate::providers::RetryStats;
use crate::tracker::PerformanceTracker;
use comfy_table::{Cell, Table};
use std::collections::HashMap;

fn add_section(table: &mut Table, title: &str) {
    table.add_row(vec![ui::section_cell(title), Cell::new("")]);
}

fn add_metric(table: &mut Table, label: &str, value: impl Into<String>) {
    table.add_row(vec![Cell::new(format!("  {label}")), ui::value_cell(value)]);
}

impl PerformanceTracker {
    /// End-of-run report combining challenge, API and cache statistics.
    pub fn display_as_table(&self, api: &RetryStats, cache: &CacheStats) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);

        add_section(&mut table, "Challenges");
        add_metric(&mut table, "Total", self.total().to_string());
        add_metric(&mut table, "Processed", self.processed.to_string());
        add_metric(&mut table, "Skipped", self.skipped.to_string());
        if let Some(rate) = self.skip_rate() {
            add_metric(&mut table, "Skip rate", format!("{rate:.1}%"));
        }
        let mut reasons: Vec<_> = self.skip_reasons.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1));
        for (reason, count) in reasons {
            add_metric(&mut table, &format!("- {reason}"), count.to_string());
        }

        if let Some(rate) = self.acceptance_rate() {
            add_section(&mut table, "Solutions");
            add_metric(&mut table, "Accepted", self.accepted.to_string());
            add_metric(&mut table, "Rejected", self.rejected.to_string());
            table.add_row(vec![
                Cell::new("  Success rate"),
                ui::format_percentage_cell(rate),
            ]);
        }

        let strategies: u64 = self.strategy_usage.values().sum();
        if strategies > 0 {
            add_section(&mut table, "Strategies");
            for (strategy, count) in &self.strategy_usage {
                let pct = *count as f64 / strategies as f64 * 100.0;
                add_metric(
                    &mut table,
                    &strategy.to_string(),
                    format!("{count} ({pct:.1}%)"),
                );
            }
        }

        add_section(&mut table, "API");
        add_metric(&mut table, "Calls", api.total_calls.to_string());
        add_metric(&mut table, "Retries", api.retries.to_string());
        add_metric(&mut table, "Failures", api.failures.to_string());
        add_metric(&mut table, "Success rate", format!("{:.1}%", api.success_rate()));

        add_section(&mut table, "Cache");
        add_metric(&mut table, "Hits", cache.hits.to_string());
        add_metric(&mut table, "Misses", cache.misses.to_string());
        add_metric(&mut table, "Hit rate", format!("{:.1}%", cache.hit_rate()));
        add_metric(
            &mut table,
            "Historical entries",
            cache.historical_entries.to_string(),
        );

        if let Some((average, fastest, slowest)) = self.timing() {
            add_section(&mut table, "Processing");
            add_metric(&mut table, "Average", format!("{:.2}s", average.as_secs_f64()));
            add_metric(&mut table, "Fastest", format!("{:.2}s", fastest.as_secs_f64()));
            add_metric(&mut table, "Slowest", format!("{:.2}s", slowest.as_secs_f64()));
        }

        let elapsed = self.elapsed().as_secs_f64();
        let mut output = format!(
            "{}\n\n",
            ui::style_text("Performance Summary", ui::StyleType::Title)
        );
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\n{} {}",
            ui::style_text("Total time:", ui::StyleType::TotalLabel),
            ui::style_text(&format!("{elapsed:.1}s"), ui::StyleType::TotalValue)
        ));
        if self.processed > 0 && elapsed > 0.0 {
            output.push_str(&ui::style_text(
                &format!(" ({:.2} challenges/s)", self.processed as f64 / elapsed),
                ui::StyleType::Subtle,
            ));
        }
        output
    }
}

/// Positions with their cost at the given prices.
pub fn allocation_table(allocation: &Allocation, prices: &HashMap<String, f64>) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Shares"),
        ui::header_cell("Price"),
        ui::header_cell("Cost"),
    ]);
    for position in allocation {
        let price = prices.get(&position.ticker).copied();
        table.add_row(vec![
            Cell::new(&position.ticker),
            ui::value_cell(position.shares.to_string()),
            ui::format_optional_cell(price, |p| format!("{p:.2}")),
            ui::format_optional_cell(price, |p| format!("{:.2}", p * position.shares as f64)),
        ]);
    }
    table.to_string()
}

/// Current prices for the universe; unpriced tickers show as N/A.
pub fn price_table(universe: &[Stock], prices: &HashMap<String, f64>) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Sector"),
        ui::header_cell("Price"),
    ]);
    for stock in universe {
        table.add_row(vec![
            Cell::new(&stock.ticker),
            Cell::new(&stock.sector),
            ui::format_optional_cell(prices.get(&stock.ticker), |p| format!("{p:.2}")),
        ]);
    }

    let priced = universe
        .iter()
        .filter(|s| prices.contains_key(&s.ticker))
        .count();
    let style = if priced == universe.len() {
        ui::StyleType::TotalValue
    } else {
        ui::StyleType::Error
    };
    format!(
        "{}\n\n{} {}",
        table,
        ui::style_text("Priced:", ui::StyleType::TotalLabel),
        ui::style_text(&format!("{priced}/{}", universe.len()), style)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::Strategy;
    use crate::preferences::SkipReason;

    #[test]
    fn test_summary_contains_sections() {
        let mut tracker = PerformanceTracker::new();
        tracker.record_skip(SkipReason::NoBudget);
        tracker.record_processed(Strategy::Diversification);
        tracker.record_solution(true);

        let api = RetryStats {
            total_calls: 10,
            retries: 1,
            failures: 1,
        };
        let cache = CacheStats {
            hits: 3,
            misses: 1,
            current_entries: 2,
            historical_entries: 4,
        };
        let output = console::strip_ansi_codes(&tracker.display_as_table(&api, &cache)).to_string();

        assert!(output.contains("Performance Summary"));
        assert!(output.contains("No budget information found"));
        assert!(output.contains("Diversification"));
        assert!(output.contains("90.0%"));
        assert!(output.contains("75.0%"));
    }

    #[test]
    fn test_price_table_marks_missing() {
        let universe = vec![Stock::new("AAPL", "Technology"), Stock::new("KO", "Consumer Defensive")];
        let prices = HashMap::from([("AAPL".to_string(), 189.5)]);
        let output = console::strip_ansi_codes(&price_table(&universe, &prices)).to_string();
        assert!(output.contains("189.50"));
        assert!(output.contains("N/A"));
        assert!(output.contains("1/2"));
    }

    #[test]
    fn test_allocation_table_costs() {
        let mut allocation = Allocation::new();
        allocation.push("AAPL", 2);
        let prices = HashMap::from([("AAPL".to_string(), 100.25)]);
        let output = allocation_table(&allocation, &prices);
        assert!(output.contains("200.50"));
    }
}
