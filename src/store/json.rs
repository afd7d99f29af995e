use super::{HistoricalKey, HistoricalStore, decode_key, encode_key};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    historical: BTreeMap<String, f64>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

/// Historical prices in a single pretty-printed JSON file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Time of the last successful save, if the file exists.
    pub fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read()?.and_then(|file| file.last_updated))
    }

    fn read(&self) -> Result<Option<CacheFile>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cache file: {}", self.path.display()))?;
        let file = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", self.path.display()))?;
        Ok(Some(file))
    }
}

impl HistoricalStore for JsonFileStore {
    fn load(&self) -> Result<HashMap<HistoricalKey, f64>> {
        let Some(file) = self.read()? else {
            debug!("No cache file at {}", self.path.display());
            return Ok(HashMap::new());
        };

        let mut entries = HashMap::with_capacity(file.historical.len());
        for (key, price) in file.historical {
            match decode_key(&key) {
                Some(k) => {
                    entries.insert(k, price);
                }
                None => warn!(key = %key, "Skipping malformed cache key"),
            }
        }
        Ok(entries)
    }

    fn save(&self, entries: &HashMap<HistoricalKey, f64>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }

        let file = CacheFile {
            historical: entries
                .iter()
                .map(|((ticker, date), price)| (encode_key(ticker, *date), *price))
                .collect(),
            last_updated: Some(Utc::now()),
        };
        let contents = serde_json::to_string_pretty(&file)?;

        // Write-then-rename so a crash mid-write never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write cache file: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace cache file: {}", self.path.display()))?;
        debug!(entries = entries.len(), "Saved cache file");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}
