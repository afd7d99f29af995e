use chrono::NaiveDate;
use std::collections::BTreeSet;

/// What a single client asked for, derived once per challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientContext {
    pub budget: f64,
    pub target_date: NaiveDate,
    pub preferred_sectors: BTreeSet<String>,
    pub avoided_sectors: BTreeSet<String>,
    /// 0-100, higher means more specific preferences.
    pub preference_strength: u8,
}

impl ClientContext {
    pub fn is_avoided(&self, sector: &str) -> bool {
        self.avoided_sectors.contains(sector)
    }

    pub fn is_preferred(&self, sector: &str) -> bool {
        self.preferred_sectors.contains(sector)
    }
}
