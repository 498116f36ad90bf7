//! Runtime configuration.
//!
//! Engine settings come from a JSON file (see `config.example.json`);
//! exchange credentials come from the environment so they never land in a
//! checked-in file.

use std::env;
use std::path::Path;
use std::time::Duration;

use bigdecimal::{BigDecimal, FromPrimitive};
use eyre::{Error, Result};
use serde::Deserialize;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Origin assets the engine trades out of and back into
    pub quote_assets: Vec<String>,
    /// Trading pair filter thresholds
    #[serde(default)]
    pub pair_filter: PairFilterConfig,
    /// Order sizing and pacing policy
    #[serde(default)]
    pub order: OrderConfig,
    /// Override for the exchange REST base URL
    #[serde(default)]
    pub http_base: Option<String>,
}

/// Thresholds applied by the market metadata filter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PairFilterConfig {
    /// Whether the 24h-statistics thresholds are applied at all
    pub enable: bool,
    /// Symbols that are never traded regardless of statistics
    pub black_list: Vec<String>,
    /// Minimum 24h quote volume; 0 disables the check
    pub quote_volume_limit: f64,
    /// Minimum 24h base volume; 0 disables the check
    pub volume_limit: f64,
    /// Minimum 24h trade count; 0 disables the check
    pub trade_count_limit: u64,
}

impl PairFilterConfig {
    /// Whether any volume threshold is configured, i.e. whether the filter
    /// needs the 24h statistics at all.
    #[must_use]
    pub fn needs_stats(&self) -> bool {
        self.enable
            && (self.quote_volume_limit > 0.0
                || self.volume_limit > 0.0
                || self.trade_count_limit > 0)
    }
}

/// Order sizing and pacing policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderConfig {
    /// Whether orders are actually submitted; false means detect-only
    pub enable: bool,
    /// Delay between cycles, in seconds
    pub interval: u64,
    /// Cap the initial quantity at the cascader's liquidity-bounded quantity
    pub use_best_init_quantity: bool,
    /// Fraction of the free origin-asset balance invested per cycle
    pub max_investment_ratio: f64,
    /// Minimum acceptable profit ratio for a chain to be executed
    pub only_profit_greater_equal_than: f64,
    /// How many screening-ranked chains are promoted to the depth-aware pass
    pub promote_top: usize,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            enable: false,
            interval: 10,
            use_best_init_quantity: true,
            max_investment_ratio: 0.5,
            only_profit_greater_equal_than: 0.001,
            promote_top: 20,
        }
    }
}

impl OrderConfig {
    /// Delay between cycles.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// The investment ratio as a decimal.
    ///
    /// # Errors
    /// * If the configured ratio is not a finite number
    pub fn investment_ratio(&self) -> Result<BigDecimal> {
        BigDecimal::from_f64(self.max_investment_ratio)
            .ok_or_else(|| Error::msg("maxInvestmentRatio is not a finite number"))
    }

    /// The minimum acceptable profit ratio as a decimal.
    ///
    /// # Errors
    /// * If the configured threshold is not a finite number
    pub fn min_profit(&self) -> Result<BigDecimal> {
        BigDecimal::from_f64(self.only_profit_greater_equal_than)
            .ok_or_else(|| Error::msg("onlyProfitGreaterEqualThan is not a finite number"))
    }
}

impl Config {
    /// Loads the configuration from a JSON file.
    ///
    /// # Errors
    /// * If the file cannot be read
    /// * If the file is not valid JSON matching the config shape
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::msg(format!("cannot read config {}: {e}", path.display())))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Exchange API credentials, read from the environment.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    /// API key, sent as a request header
    pub key: String,
    /// API secret, used to sign order and account requests
    pub secret: String,
}

impl ApiCredentials {
    /// Reads credentials from `TRINE_API_KEY` / `TRINE_API_SECRET`.
    ///
    /// # Errors
    /// * If either variable is not set
    pub fn from_env() -> Result<Self> {
        let key =
            env::var("TRINE_API_KEY").map_err(|_| Error::msg("TRINE_API_KEY must be set"))?;
        let secret = env::var("TRINE_API_SECRET")
            .map_err(|_| Error::msg("TRINE_API_SECRET must be set"))?;
        Ok(Self { key, secret })
    }
}
