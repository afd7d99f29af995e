use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Stock {
    pub ticker: String,
    pub sector: String,
}

impl Stock {
    pub fn new(ticker: &str, sector: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            sector: sector.to_string(),
        }
    }
}

const UNIVERSE: &[(&str, &str)] = &[
    ("AAPL", "Technology"),
    ("MSFT", "Technology"),
    ("GOOG", "Technology"),
    ("AMZN", "Consumer Cyclical"),
    ("NVDA", "Technology"),
    ("META", "Communication Services"),
    ("TSLA", "Consumer Cyclical"),
    ("BRK.B", "Financial Services"),
    ("V", "Financial Services"),
    ("JNJ", "Healthcare"),
    ("WMT", "Consumer Defensive"),
    ("JPM", "Financial Services"),
    ("MA", "Financial Services"),
    ("PG", "Consumer Defensive"),
    ("UNH", "Healthcare"),
    ("HD", "Consumer Cyclical"),
    ("CVX", "Energy"),
    ("MRK", "Healthcare"),
    ("ABBV", "Healthcare"),
    ("KO", "Consumer Defensive"),
    ("PEP", "Consumer Defensive"),
    ("AVGO", "Technology"),
    ("COST", "Consumer Defensive"),
    ("MCD", "Consumer Cyclical"),
    ("TMO", "Healthcare"),
    ("CSCO", "Technology"),
    ("ACN", "Technology"),
    ("DHR", "Healthcare"),
    ("VZ", "Communication Services"),
    ("ADBE", "Technology"),
    ("NFLX", "Communication Services"),
    ("NKE", "Consumer Cyclical"),
    ("CRM", "Technology"),
    ("ORCL", "Technology"),
    ("ABT", "Healthcare"),
    ("PFE", "Healthcare"),
    ("INTC", "Technology"),
    ("DIS", "Communication Services"),
    ("CMCSA", "Communication Services"),
    ("AMD", "Technology"),
    ("T", "Communication Services"),
    ("COP", "Energy"),
    ("NEE", "Utilities"),
    ("UPS", "Industrials"),
    ("IBM", "Technology"),
    ("BA", "Industrials"),
    ("CAT", "Industrials"),
    ("GE", "Industrials"),
    ("HON", "Industrials"),
    ("MMM", "Industrials"),
    ("DE", "Industrials"),
];

/// The built-in stock universe used when the config does not list one.
pub fn default_universe() -> Vec<Stock> {
    UNIVERSE
        .iter()
        .map(|(ticker, sector)| Stock::new(ticker, sector))
        .collect()
}

/// Keywords that map free text onto a sector label.
pub const SECTOR_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Technology",
        &["tech", "software", "ai", "cloud", "semiconductor", "computer"],
    ),
    (
        "Healthcare",
        &["health", "pharma", "biotech", "medical", "drug"],
    ),
    (
        "Financial Services",
        &["bank", "financial", "finance", "payment", "credit"],
    ),
    ("Energy", &["energy", "oil", "gas", "petroleum"]),
    (
        "Consumer Defensive",
        &["consumer defensive", "staple", "retail", "food", "beverage"],
    ),
    (
        "Consumer Cyclical",
        &["consumer cyclical", "discretionary", "restaurant", "travel"],
    ),
    (
        "Communication Services",
        &["communication", "media", "telecom", "entertainment"],
    ),
    (
        "Industrials",
        &["industrial", "manufacturing", "aerospace", "machinery"],
    ),
    ("Utilities", &["utilit", "electric", "water", "power"]),
];
