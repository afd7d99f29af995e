use super::{HistoricalKey, HistoricalStore, decode_key, encode_key};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

const PARTITION: &str = "historical";
const LAST_UPDATED_KEY: &str = "__last_updated";

/// Historical prices in an embedded fjall keyspace.
///
/// Values are stored as big-endian `f64` bytes so reloads are bit-exact.
pub struct FjallStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl FjallStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        let keyspace = Config::new(path)
            .open()
            .with_context(|| format!("Failed to open keyspace: {}", path.display()))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open historical partition")?;
        Ok(Self {
            keyspace,
            partition,
        })
    }

    pub fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.partition.get(LAST_UPDATED_KEY)? else {
            return Ok(None);
        };
        let text = std::str::from_utf8(&raw)?;
        Ok(Some(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc)))
    }
}

fn decode_price(raw: &[u8]) -> Result<f64> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| anyhow!("expected 8 bytes, got {}", raw.len()))?;
    Ok(f64::from_be_bytes(bytes))
}

impl HistoricalStore for FjallStore {
    fn load(&self) -> Result<HashMap<HistoricalKey, f64>> {
        let mut entries = HashMap::new();
        for item in self.partition.iter() {
            let (key, value) = item?;
            let Ok(key) = std::str::from_utf8(&key) else {
                warn!("Skipping non UTF-8 cache key");
                continue;
            };
            if key == LAST_UPDATED_KEY {
                continue;
            }
            match (decode_key(key), decode_price(&value)) {
                (Some(k), Ok(price)) => {
                    entries.insert(k, price);
                }
                _ => warn!(key = %key, "Skipping malformed cache entry"),
            }
        }
        Ok(entries)
    }

    fn save(&self, entries: &HashMap<HistoricalKey, f64>) -> Result<()> {
        let wanted: HashSet<String> = entries
            .keys()
            .map(|(ticker, date)| encode_key(ticker, *date))
            .collect();

        let mut stale = Vec::new();
        for item in self.partition.iter() {
            let (key, _) = item?;
            let key = String::from_utf8_lossy(&key).into_owned();
            if key != LAST_UPDATED_KEY && !wanted.contains(&key) {
                stale.push(key);
            }
        }
        for key in stale {
            self.partition.remove(key)?;
        }

        for ((ticker, date), price) in entries {
            self.partition
                .insert(encode_key(ticker, *date), price.to_be_bytes())?;
        }
        self.partition
            .insert(LAST_UPDATED_KEY, Utc::now().to_rfc3339())?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(entries = entries.len(), "Persisted keyspace");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("fjall:{PARTITION}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn key(ticker: &str, day: u32) -> HistoricalKey {
        (
            ticker.to_string(),
            NaiveDate::from_ymd_opt(2022, 1, day).unwrap(),
        )
    }

    #[test]
    fn test_fjall_store_round_trip() {
        let dir = tempdir().unwrap();
        let mut entries = HashMap::new();
        entries.insert(key("AAPL", 3), 182.01);
        entries.insert(key("KO", 4), 59.999_999);

        {
            let store = FjallStore::open(dir.path()).unwrap();
            assert!(store.load().unwrap().is_empty());
            store.save(&entries).unwrap();
            assert!(store.last_updated().unwrap().is_some());
        }

        let reopened = FjallStore::open(dir.path()).unwrap();
        assert_eq!(reopened.load().unwrap(), entries);
    }

    #[test]
    fn test_fjall_store_save_drops_removed_entries() {
        let dir = tempdir().unwrap();
        let store = FjallStore::open(dir.path()).unwrap();

        let mut entries = HashMap::new();
        entries.insert(key("AAPL", 3), 182.01);
        store.save(&entries).unwrap();

        store.save(&HashMap::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
