//! Durable storage for the historical price region.
//!
//! Every backend stores the same flat mapping: `TICKER|YYYY-MM-DD` to a
//! price, plus the time of the last save.

pub mod disk;
pub mod json;
pub mod memory;

use crate::core::config::{AppConfig, CacheBackend};
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

pub use disk::FjallStore;
pub use json::JsonFileStore;
pub use memory::MemoryStore;

pub type HistoricalKey = (String, NaiveDate);

const KEY_SEPARATOR: char = '|';
const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_key(ticker: &str, date: NaiveDate) -> String {
    format!("{ticker}{KEY_SEPARATOR}{}", date.format(DATE_FORMAT))
}

pub fn decode_key(key: &str) -> Option<HistoricalKey> {
    let (ticker, date) = key.rsplit_once(KEY_SEPARATOR)?;
    if ticker.is_empty() {
        return None;
    }
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    Some((ticker.to_string(), date))
}

pub trait HistoricalStore: Send + Sync {
    /// Reads the whole region. A store that has never been written is empty, not an error.
    fn load(&self) -> Result<HashMap<HistoricalKey, f64>>;

    fn save(&self, entries: &HashMap<HistoricalKey, f64>) -> Result<()>;

    fn describe(&self) -> String;
}

/// Opens the backend selected in the config.
pub fn open(config: &AppConfig) -> Result<Arc<dyn HistoricalStore>> {
    let path = config.cache_path()?;
    Ok(match config.cache.backend {
        CacheBackend::Json => Arc::new(JsonFileStore::new(path)),
        CacheBackend::Fjall => Arc::new(FjallStore::open(&path)?),
    })
}
