//! Two-region price cache.
//!
//! Current prices live in memory and expire after a TTL; they are checked
//! against the wall clock at read time and evicted lazily. Historical prices
//! are keyed by `(ticker, date)`, never expire, and are persisted through a
//! [`HistoricalStore`] in batches plus an explicit [`PriceCache::flush`].

use crate::store::{HistoricalKey, HistoricalStore};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
struct CurrentEntry {
    value: f64,
    observed_at: Instant,
}

#[derive(Default)]
struct Regions {
    current: HashMap<String, CurrentEntry>,
    historical: HashMap<HistoricalKey, f64>,
    /// New historical entries not yet persisted.
    pending: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub current_entries: usize,
    pub historical_entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64 * 100.0
    }
}

pub struct PriceCache {
    regions: Mutex<Regions>,
    /// Serialises saves so snapshots reach the store in the order they were taken.
    save_lock: Mutex<()>,
    store: Arc<dyn HistoricalStore>,
    ttl: Duration,
    flush_every: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PriceCache {
    /// Builds the cache and reloads the historical region from `store`.
    ///
    /// A missing or unreadable store yields an empty historical region.
    pub fn new(store: Arc<dyn HistoricalStore>, ttl: Duration, flush_every: usize) -> Self {
        let cache = Self {
            regions: Mutex::new(Regions::default()),
            save_lock: Mutex::new(()),
            store,
            ttl,
            flush_every: flush_every.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };
        cache.load_from_durable();
        cache
    }

    fn lock(&self) -> MutexGuard<'_, Regions> {
        // A panicked writer cannot leave a half-updated map entry behind.
        self.regions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn load_from_durable(&self) {
        match self.store.load() {
            Ok(entries) => {
                info!(
                    count = entries.len(),
                    store = %self.store.describe(),
                    "Loaded historical prices"
                );
                let mut regions = self.lock();
                regions.historical = entries;
                regions.pending = 0;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    store = %self.store.describe(),
                    "Failed to load historical prices, starting empty"
                );
            }
        }
    }

    pub fn get_current(&self, ticker: &str) -> Option<f64> {
        let mut regions = self.lock();
        let entry = regions.current.get(ticker).copied();
        let value = match entry {
            Some(entry) if entry.observed_at.elapsed() < self.ttl => Some(entry.value),
            Some(_) => {
                debug!(ticker, "Current price expired");
                regions.current.remove(ticker);
                None
            }
            None => None,
        };
        drop(regions);

        if value.is_some() {
            debug!(ticker, "Cache HIT");
        } else {
            debug!(ticker, "Cache MISS");
        }
        self.record(value.is_some());
        value
    }

    pub fn set_current(&self, ticker: &str, value: f64) {
        let entry = CurrentEntry {
            value,
            observed_at: Instant::now(),
        };
        self.lock().current.insert(ticker.to_string(), entry);
        debug!(ticker, value, "Cache PUT current");
    }

    pub fn get_historical(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let value = self
            .lock()
            .historical
            .get(&(ticker.to_string(), date))
            .copied();
        if value.is_some() {
            debug!(ticker, %date, "Cache HIT");
        } else {
            debug!(ticker, %date, "Cache MISS");
        }
        self.record(value.is_some());
        value
    }

    /// Records a historical price. The first value written for a key wins.
    pub fn set_historical(&self, ticker: &str, date: NaiveDate, value: f64) {
        let mut regions = self.lock();
        let key = (ticker.to_string(), date);
        if regions.historical.contains_key(&key) {
            debug!(ticker, %date, "Historical price already cached");
            return;
        }
        regions.historical.insert(key, value);
        regions.pending += 1;
        debug!(ticker, %date, value, "Cache PUT historical");

        let due = regions.pending >= self.flush_every;
        drop(regions);
        if due {
            self.persist(false);
        }
    }

    /// Persists any unsaved historical entries. Safe to call repeatedly.
    pub fn flush(&self) {
        self.persist(false);
    }

    /// Saves a snapshot of the historical region. Store I/O runs with the map lock released.
    fn persist(&self, force: bool) {
        let _saving = self.save_lock.lock().unwrap_or_else(|e| e.into_inner());
        let (snapshot, pending) = {
            let regions = self.lock();
            if regions.pending == 0 && !force {
                return;
            }
            (regions.historical.clone(), regions.pending)
        };

        match self.store.save(&snapshot) {
            Ok(()) => {
                debug!(count = snapshot.len(), "Persisted historical prices");
                let mut regions = self.lock();
                regions.pending = regions.pending.saturating_sub(pending);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    store = %self.store.describe(),
                    "Failed to persist historical prices"
                );
            }
        }
    }

    /// Drops expired current entries, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let mut regions = self.lock();
        let before = regions.current.len();
        let ttl = self.ttl;
        regions
            .current
            .retain(|_, entry| entry.observed_at.elapsed() < ttl);
        before - regions.current.len()
    }

    /// Empties both regions and persists the empty historical region.
    pub fn clear(&self) {
        {
            let mut regions = self.lock();
            regions.current.clear();
            regions.historical.clear();
            regions.pending = 0;
        }
        self.persist(true);
        info!("Cleared price cache");
    }

    pub fn stats(&self) -> CacheStats {
        let regions = self.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            current_entries: regions.current.len(),
            historical_entries: regions.historical.len(),
        }
    }

    /// Returns a guard that flushes the cache when dropped.
    pub fn flush_guard(self: &Arc<Self>) -> FlushGuard {
        FlushGuard {
            cache: Arc::clone(self),
        }
    }
}

/// Flushes unsaved historical prices when it goes out of scope.
pub struct FlushGuard {
    cache: Arc<PriceCache>,
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        debug!("Flushing price cache");
        self.cache.flush();
    }
}
