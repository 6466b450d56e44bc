use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::fallback::FallbackPrice;

/// Coarse asset classification used for the distribution breakdown.
/// Supplied per holding by whoever maintains the config (the asset-metadata
/// side of the world); the valuation core only groups by it.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    Stock,
    Etf,
    RealEstateFund,
    FixedIncome,
    Crypto,
    Fund,
}

impl Display for AssetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetCategory::Stock => "Stocks",
                AssetCategory::Etf => "ETFs",
                AssetCategory::RealEstateFund => "Real Estate Funds",
                AssetCategory::FixedIncome => "Fixed Income",
                AssetCategory::Crypto => "Crypto",
                AssetCategory::Fund => "Funds",
            }
        )
    }
}

/// One position as recorded by the user: what they hold and what it cost.
/// Read-only to the valuation core.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Holding {
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: Decimal,
    /// Total amount paid. Defaults to `quantity × average_cost` when absent.
    #[serde(default)]
    pub invested_amount: Option<Decimal>,
    /// Last price the user saw for this symbol; the valuation's
    /// fallback-of-last-resort when every quote source fails.
    #[serde(default)]
    pub last_known_price: Option<Decimal>,
    #[serde(default)]
    pub category: Option<AssetCategory>,
}

impl Holding {
    pub fn invested(&self) -> Decimal {
        self.invested_amount
            .unwrap_or_else(|| self.average_cost * Decimal::from(self.quantity))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Portfolio {
    pub name: String,
    pub holdings: Vec<Holding>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketDataConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        MarketDataConfig {
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_quote_ttl_secs")]
    pub quote_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            quote_ttl_secs: default_quote_ttl_secs(),
        }
    }
}

fn default_quote_ttl_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ValuationConfig {
    /// Upper bound on concurrent quote fetches per valuation.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Deadline for one whole valuation; pending symbols fall back past it.
    #[serde(default = "default_valuation_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        ValuationConfig {
            concurrency: default_concurrency(),
            timeout_ms: default_valuation_timeout_ms(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_valuation_timeout_ms() -> u64 {
    15000
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub portfolio: Portfolio,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub valuation: ValuationConfig,
    /// Last-known-good prices served when the provider is rate-limited or
    /// down. Policy data, kept in config rather than code.
    #[serde(default)]
    pub fallback_prices: HashMap<String, FallbackPrice>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "portval")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
