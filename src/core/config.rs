use crate::core::stock::{Stock, default_universe};
use crate::portfolio::strategy::StrategyBands;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within (0, 1], got {value}")]
    InvalidFraction { name: &'static str, value: f64 },

    #[error("initial budget usage {initial} exceeds target usage {target}")]
    UsageOrder { initial: f64, target: f64 },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("strategy bands are invalid: {0}")]
    Bands(String),

    #[error("stock universe contains duplicate ticker {0}")]
    DuplicateTicker(String),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PrismProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimexProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub prism: PrismProviderConfig,
    pub limex: LimexProviderConfig,
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            prism: PrismProviderConfig {
                base_url: "http://www.prism-challenge.com:8082".to_string(),
                api_key: None,
            },
            limex: LimexProviderConfig {
                base_url: "https://api.limex-data.com".to_string(),
            },
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Json,
    Fjall,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub path: Option<String>,
    /// Persist the historical region after this many new entries.
    pub flush_every: usize,
    pub backend: CacheBackend,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: 300,
            path: None,
            flush_every: 10,
            backend: CacheBackend::Json,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    pub workers: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig { workers: 10 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BudgetConfig {
    pub initial_usage: f64,
    pub target_usage: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        BudgetConfig {
            initial_usage: 0.96,
            target_usage: 0.98,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub providers: ProvidersConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub fetch: FetchConfig,
    pub budget: BudgetConfig,
    pub strategy: StrategyBands,
    pub stocks: Vec<Stock>,
    pub loop_delay_ms: u64,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            fetch: FetchConfig::default(),
            budget: BudgetConfig::default(),
            strategy: StrategyBands::default(),
            stocks: default_universe(),
            loop_delay_ms: 300,
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "prism", "prism-bot")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("com", "prism", "prism-bot")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Location of the durable historical-price store.
    pub fn cache_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache.path {
            return Ok(PathBuf::from(path));
        }
        let name = match self.cache.backend {
            CacheBackend::Json => "price_cache.json",
            CacheBackend::Fjall => "price_cache",
        };
        Ok(self.default_data_path()?.join(name))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = if config_str.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&config_str).with_context(|| {
                format!("Failed to parse config file: {}", path.as_ref().display())
            })?
        };
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("budget.initial_usage", self.budget.initial_usage),
            ("budget.target_usage", self.budget.target_usage),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidFraction { name, value });
            }
        }
        if self.budget.initial_usage > self.budget.target_usage {
            return Err(ConfigError::UsageOrder {
                initial: self.budget.initial_usage,
                target: self.budget.target_usage,
            });
        }
        if self.fetch.workers == 0 {
            return Err(ConfigError::Zero("fetch.workers"));
        }
        if self.cache.flush_every == 0 {
            return Err(ConfigError::Zero("cache.flush_every"));
        }
        self.strategy.validate().map_err(ConfigError::Bands)?;

        let mut seen = std::collections::HashSet::new();
        for stock in &self.stocks {
            if !seen.insert(stock.ticker.as_str()) {
                return Err(ConfigError::DuplicateTicker(stock.ticker.clone()));
            }
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.providers.timeout_secs)
    }
}
