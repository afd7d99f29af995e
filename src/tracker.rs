use crate::portfolio::Strategy;
use crate::preferences::SkipReason;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Running tally of how challenges were handled.
#[derive(Debug)]
pub struct PerformanceTracker {
    pub processed: u64,
    pub skipped: u64,
    pub skip_reasons: BTreeMap<SkipReason, u64>,
    pub strategy_usage: BTreeMap<Strategy, u64>,
    pub accepted: u64,
    pub rejected: u64,
    pub processing_times: Vec<Duration>,
    started: Instant,
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            processed: 0,
            skipped: 0,
            skip_reasons: BTreeMap::new(),
            strategy_usage: Strategy::ALL.iter().map(|s| (*s, 0)).collect(),
            accepted: 0,
            rejected: 0,
            processing_times: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn record_skip(&mut self, reason: SkipReason) {
        self.skipped += 1;
        *self.skip_reasons.entry(reason).or_default() += 1;
    }

    pub fn record_processed(&mut self, strategy: Strategy) {
        self.processed += 1;
        *self.strategy_usage.entry(strategy).or_default() += 1;
    }

    pub fn record_solution(&mut self, accepted: bool) {
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }

    pub fn record_processing_time(&mut self, elapsed: Duration) {
        self.processing_times.push(elapsed);
    }

    /// Challenges seen, processed or skipped.
    pub fn total(&self) -> u64 {
        self.processed + self.skipped
    }

    pub fn skip_rate(&self) -> Option<f64> {
        percentage(self.skipped, self.total())
    }

    pub fn acceptance_rate(&self) -> Option<f64> {
        percentage(self.accepted, self.accepted + self.rejected)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// (average, fastest, slowest) processing time.
    pub fn timing(&self) -> Option<(Duration, Duration, Duration)> {
        let fastest = *self.processing_times.iter().min()?;
        let slowest = *self.processing_times.iter().max()?;
        let total: Duration = self.processing_times.iter().sum();
        let average = total / self.processing_times.len() as u32;
        Some((average, fastest, slowest))
    }

    pub fn quick_stats(&self) -> String {
        format!(
            "Stats: {} total | {} processed | {} skipped | {} accepted | {} rejected",
            self.total(),
            self.processed,
            self.skipped,
            self.accepted,
            self.rejected
        )
    }
}

fn percentage(part: u64, whole: u64) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut tracker = PerformanceTracker::new();
        tracker.record_skip(SkipReason::NoBudget);
        tracker.record_skip(SkipReason::NoBudget);
        tracker.record_skip(SkipReason::InvalidDate);
        tracker.record_processed(Strategy::HighConviction);
        tracker.record_solution(true);

        assert_eq!(tracker.total(), 4);
        assert_eq!(tracker.skip_reasons[&SkipReason::NoBudget], 2);
        assert_eq!(tracker.strategy_usage[&Strategy::HighConviction], 1);
        assert_eq!(tracker.strategy_usage[&Strategy::Diversification], 0);
        assert_eq!(tracker.skip_rate(), Some(75.0));
        assert_eq!(tracker.acceptance_rate(), Some(100.0));
        assert_eq!(
            tracker.quick_stats(),
            "Stats: 4 total | 1 processed | 3 skipped | 1 accepted | 0 rejected"
        );
    }

    #[test]
    fn test_timing() {
        let mut tracker = PerformanceTracker::new();
        assert_eq!(tracker.timing(), None);
        assert_eq!(tracker.acceptance_rate(), None);

        tracker.record_processing_time(Duration::from_millis(100));
        tracker.record_processing_time(Duration::from_millis(300));
        let (avg, fastest, slowest) = tracker.timing().unwrap();
        assert_eq!(avg, Duration::from_millis(200));
        assert_eq!(fastest, Duration::from_millis(100));
        assert_eq!(slowest, Duration::from_millis(300));
    }
}
