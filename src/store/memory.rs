use super::{HistoricalKey, HistoricalStore};
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-process store for ephemeral runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<HistoricalKey, f64>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes every subsequent load and save fail, to exercise I/O error paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> HashMap<HistoricalKey, f64> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl HistoricalStore for MemoryStore {
    fn load(&self) -> Result<HashMap<HistoricalKey, f64>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store is failing"));
        }
        Ok(self.snapshot())
    }

    fn save(&self, entries: &HashMap<HistoricalKey, f64>) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store is failing"));
        }
        *self.entries.lock().unwrap_or_else(|e| e.into_inner()) = entries.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
