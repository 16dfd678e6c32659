//! Ledger configuration
//!
//! Loaded from a TOML file; every section and field falls back to the
//! defaults below when omitted.
//!
//! ```toml
//! [store]
//! lock_timeout_ms = 2000
//!
//! [risk]
//! high_amount = "10000"
//! velocity_limit = 5
//!
//! [assets.BTC]
//! name = "Bitcoin"
//! precision = 8
//! min_quantity = "0.00001"
//! min_trade_usd = "1.00"
//! price = "45230"
//! ```

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("config I/O error: {0}")]
    Io(String),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub store: StoreConfig,
    pub risk: RiskConfig,
    pub risk_worker: RiskWorkerConfig,
    pub assets: BTreeMap<String, AssetSpec>,
}

/// Row-locking behavior of the ledger and wallet stores
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long an atomic unit waits for a row lock before giving up
    /// with a transient error
    pub lock_timeout_ms: u64,
}

/// Thresholds of the anomaly scorer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Amounts strictly above this add the high-amount weight
    pub high_amount: Decimal,
    /// Entries in the trailing hour at or above this add the velocity weight
    pub velocity_limit: usize,
    /// First hour of the night window (local time, inclusive)
    pub night_start_hour: u32,
    /// Last hour of the night window (local time, inclusive)
    pub night_end_hour: u32,
    /// Amounts above this multiple of the 30-day average are unusual
    pub average_multiplier: Decimal,
    pub round_number_unit: Decimal,
    pub round_number_floor: Decimal,
    pub medium_score: u8,
    pub high_score: u8,
    /// HIGH signals at or above this score freeze the account
    pub freeze_score: u8,
    /// Default page size when listing alerts
    pub alert_limit: usize,
}

/// Background risk worker behavior
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RiskWorkerConfig {
    /// Attempts per job, counting the first one
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

/// Trading parameters of one asset
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetSpec {
    pub name: String,
    /// Fractional digits of quantities
    pub precision: u32,
    /// Smallest quantity a purchase may yield
    pub min_quantity: Decimal,
    /// Smallest fiat amount accepted for a purchase
    #[serde(default = "default_min_trade_usd")]
    pub min_trade_usd: Decimal,
    /// Reference price in fiat per unit
    pub price: Decimal,
}

fn default_min_trade_usd() -> Decimal {
    Decimal::new(100, 2)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 2000,
        }
    }
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_amount: Decimal::new(10_000, 0),
            velocity_limit: 5,
            night_start_hour: 22,
            night_end_hour: 6,
            average_multiplier: Decimal::new(5, 0),
            round_number_unit: Decimal::new(100, 0),
            round_number_floor: Decimal::new(1_000, 0),
            medium_score: 40,
            high_score: 70,
            freeze_score: 90,
            alert_limit: 50,
        }
    }
}

impl Default for RiskWorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 50,
        }
    }
}

impl RiskWorkerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let asset = |name: &str, precision, min_quantity, price| AssetSpec {
            name: name.to_string(),
            precision,
            min_quantity,
            min_trade_usd: default_min_trade_usd(),
            price,
        };

        let mut assets = BTreeMap::new();
        assets.insert(
            "BTC".to_string(),
            asset("Bitcoin", 8, Decimal::new(1, 5), Decimal::new(45_230, 0)),
        );
        assets.insert(
            "ETH".to_string(),
            asset("Ethereum", 8, Decimal::new(1, 3), Decimal::new(2_890, 0)),
        );
        assets.insert(
            "LTC".to_string(),
            asset("Litecoin", 8, Decimal::new(1, 3), Decimal::new(150, 0)),
        );
        assets.insert(
            "ADA".to_string(),
            asset("Cardano", 6, Decimal::new(1, 0), Decimal::new(52, 2)),
        );
        assets.insert(
            "DOT".to_string(),
            asset("Polkadot", 8, Decimal::new(1, 1), Decimal::new(25, 0)),
        );

        Self {
            store: StoreConfig::default(),
            risk: RiskConfig::default(),
            risk_worker: RiskWorkerConfig::default(),
            assets,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from a TOML file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let risk = &self.risk;

        if risk.night_start_hour > 23 || risk.night_end_hour > 23 {
            return Err(ConfigError::Validation(
                "night window hours must be between 0 and 23".to_string(),
            ));
        }
        if !(risk.medium_score < risk.high_score
            && risk.high_score <= risk.freeze_score
            && risk.freeze_score <= 100)
        {
            return Err(ConfigError::Validation(format!(
                "risk cut-offs must satisfy medium < high <= freeze <= 100 (got {}/{}/{})",
                risk.medium_score, risk.high_score, risk.freeze_score
            )));
        }
        if risk.round_number_unit <= Decimal::ZERO {
            return Err(ConfigError::Validation(
                "round_number_unit must be positive".to_string(),
            ));
        }
        if self.risk_worker.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "risk_worker.max_attempts must be at least 1".to_string(),
            ));
        }

        for (symbol, spec) in &self.assets {
            if spec.precision > 18 {
                return Err(ConfigError::Validation(format!(
                    "asset {} precision {} exceeds 18",
                    symbol, spec.precision
                )));
            }
            if spec.price <= Decimal::ZERO {
                return Err(ConfigError::Validation(format!(
                    "asset {} needs a positive price",
                    symbol
                )));
            }
            if spec.min_quantity < Decimal::ZERO || spec.min_trade_usd < Decimal::ZERO {
                return Err(ConfigError::Validation(format!(
                    "asset {} minimums must not be negative",
                    symbol
                )));
            }
        }

        Ok(())
    }
}
