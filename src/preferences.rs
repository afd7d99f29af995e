//! Turns a challenge's free-text message into a [`ClientContext`].

use crate::core::context::ClientContext;
use crate::core::stock::SECTOR_KEYWORDS;
use crate::prism::Challenge;
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::LazyLock;
use tracing::warn;

static BUDGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?(\d[\d,]*)").expect("Invalid regex pattern"));

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("Invalid regex pattern"));

static WRITTEN_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+)\s+(\d+)(?:st|nd|rd|th)?,?\s+(\d{4})").expect("Invalid regex pattern")
});

static AVOID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"avoid\s+([^\.,]+)").expect("Invalid regex pattern"));

const RISK_TERMS: &[&str] = &[
    "aggressive",
    "moderate",
    "conservative",
    "risk",
    "volatile",
    "stable",
    "growth",
    "value",
    "safe",
    "speculative",
    "balanced",
];

const SECTOR_TERMS: &[&str] = &[
    "technology",
    "tech",
    "healthcare",
    "health",
    "financial",
    "bank",
    "energy",
    "oil",
    "consumer",
    "industrial",
    "communication",
    "media",
    "utilities",
    "defensive",
    "cyclical",
];

const AVOID_TERMS: &[&str] = &["avoid", "not", "no "];

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Date used when a recognised date does not name a real calendar day.
pub fn fallback_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
}

/// Why a challenge was not answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    NoBudget,
    NonPositiveBudget,
    InvalidBudget,
    NoStartDate,
    InvalidDate,
    NoPreferences,
    PricesUnavailable,
    EmptyPortfolio,
    ValidationFailed,
    NoHistoricalPrices,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::NoBudget => "No budget information found",
            SkipReason::NonPositiveBudget => "Budget is zero or negative",
            SkipReason::InvalidBudget => "Invalid budget format",
            SkipReason::NoStartDate => "No start_date provided",
            SkipReason::InvalidDate => "Invalid date format",
            SkipReason::NoPreferences => {
                "No investment preferences found (no risk/sector/avoid terms)"
            }
            SkipReason::PricesUnavailable => "Failed to fetch prices",
            SkipReason::EmptyPortfolio => "Failed to build portfolio",
            SkipReason::ValidationFailed => "Portfolio validation failed",
            SkipReason::NoHistoricalPrices => "No historical prices",
        };
        f.write_str(text)
    }
}

fn parse_budget(message: &str) -> Result<f64, SkipReason> {
    let digits = BUDGET_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .ok_or(SkipReason::NoBudget)?
        .as_str()
        .replace(',', "");
    digits
        .parse::<f64>()
        .map_err(|_| SkipReason::InvalidBudget)
}

/// `Some(date)` for a real calendar day, `None` for a recognised but
/// impossible one (such as "February 30th, 2021"). `Err` if unrecognised.
fn parse_date(text: &str) -> Result<Option<NaiveDate>, SkipReason> {
    if ISO_DATE_RE.is_match(text) {
        return NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| SkipReason::InvalidDate);
    }
    let lower = text.to_lowercase();
    let caps = WRITTEN_DATE_RE
        .captures(&lower)
        .ok_or(SkipReason::InvalidDate)?;
    let month = MONTHS
        .iter()
        .position(|m| *m == &caps[1])
        .ok_or(SkipReason::InvalidDate)?;
    let day: u32 = caps[2].parse().map_err(|_| SkipReason::InvalidDate)?;
    let year: i32 = caps[3].parse().map_err(|_| SkipReason::InvalidDate)?;
    Ok(NaiveDate::from_ymd_opt(year, month as u32 + 1, day))
}

/// Returns the reason a challenge lacks the information needed to answer it.
pub fn should_skip(challenge: &Challenge) -> Option<SkipReason> {
    match parse_budget(&challenge.message) {
        Err(reason) => return Some(reason),
        Ok(budget) if budget <= 0.0 => return Some(SkipReason::NonPositiveBudget),
        Ok(_) => {}
    }

    let start_date = match challenge.start_date.as_deref() {
        None | Some("") => return Some(SkipReason::NoStartDate),
        Some(date) => date,
    };
    if let Err(reason) = parse_date(start_date) {
        return Some(reason);
    }

    let lower = challenge.message.to_lowercase();
    let mentions = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));
    if !mentions(RISK_TERMS) && !mentions(SECTOR_TERMS) && !mentions(AVOID_TERMS) {
        return Some(SkipReason::NoPreferences);
    }
    None
}

fn sectors_mentioned(text: &str) -> impl Iterator<Item = &'static str> + '_ {
    SECTOR_KEYWORDS
        .iter()
        .filter(move |(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(sector, _)| *sector)
}

/// Preference strength from the number of preferred and avoided sectors.
pub fn preference_strength(preferred: usize, avoided: usize) -> u8 {
    let base: u8 = match preferred {
        0 => 0,
        1 => 80,
        2 => 60,
        _ => 40,
    };
    let bonus = if avoided > 0 { 20 } else { 0 };
    (base + bonus).min(100)
}

/// Builds the client context for a challenge that passed [`should_skip`].
///
/// Sectors named in an `avoid ...` clause are avoided and never preferred.
pub fn parse_context(challenge: &Challenge) -> ClientContext {
    let budget = parse_budget(&challenge.message).unwrap_or(0.0);

    let raw_date = challenge.start_date.as_deref().unwrap_or_default();
    let target_date = match parse_date(raw_date) {
        Ok(Some(date)) => date,
        _ => {
            warn!(date = raw_date, "Unusable start date, falling back to {}", fallback_date());
            fallback_date()
        }
    };

    let lower = challenge.message.to_lowercase();
    let avoided_sectors: BTreeSet<String> = AVOID_RE
        .captures_iter(&lower)
        .filter_map(|caps| caps.get(1))
        .flat_map(|clause| sectors_mentioned(clause.as_str().trim()).collect::<Vec<_>>())
        .map(str::to_string)
        .collect();
    let preferred_sectors: BTreeSet<String> = sectors_mentioned(&lower)
        .filter(|sector| !avoided_sectors.contains(*sector))
        .map(str::to_string)
        .collect();

    ClientContext {
        budget,
        target_date,
        preference_strength: preference_strength(
            preferred_sectors.len(),
            avoided_sectors.len(),
        ),
        preferred_sectors,
        avoided_sectors,
    }
}
