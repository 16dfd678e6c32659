//! Asset catalog and reference prices
//!
//! The catalog holds the per-symbol trading constants (precision, minimum
//! trade sizes). `FixedPriceOracle` serves the configured reference prices
//! and lets callers move them, which is all the ledger needs from a market
//! data feed.

use crate::config::{AssetSpec, LedgerConfig};
use crate::core::traits::PriceOracle;
use crate::types::{AssetSymbol, LedgerError};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Supported assets keyed by symbol
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    specs: BTreeMap<AssetSymbol, AssetSpec>,
}

impl AssetCatalog {
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let mut specs = BTreeMap::new();
        for (symbol, spec) in &config.assets {
            specs.insert(AssetSymbol::parse(symbol)?, spec.clone());
        }
        Ok(Self { specs })
    }

    /// Look up a symbol, case-insensitively
    pub fn resolve(&self, symbol: &str) -> Result<(AssetSymbol, &AssetSpec), LedgerError> {
        let symbol = AssetSymbol::parse(symbol)?;
        let spec = self
            .specs
            .get(&symbol)
            .ok_or_else(|| LedgerError::unsupported_asset(symbol.as_str()))?;
        Ok((symbol, spec))
    }

    pub fn get(&self, symbol: &AssetSymbol) -> Option<&AssetSpec> {
        self.specs.get(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &AssetSymbol> {
        self.specs.keys()
    }
}

/// Price oracle backed by an in-memory table
#[derive(Debug, Default)]
pub struct FixedPriceOracle {
    prices: DashMap<AssetSymbol, Decimal>,
}

impl FixedPriceOracle {
    pub fn new() -> Self {
        Self {
            prices: DashMap::new(),
        }
    }

    /// Seed prices from the catalog's reference prices
    pub fn from_catalog(catalog: &AssetCatalog) -> Self {
        let oracle = Self::new();
        for symbol in catalog.symbols() {
            if let Some(spec) = catalog.get(symbol) {
                oracle.prices.insert(symbol.clone(), spec.price);
            }
        }
        oracle
    }

    pub fn set_price(&self, symbol: AssetSymbol, price: Decimal) {
        self.prices.insert(symbol, price);
    }
}

impl PriceOracle for FixedPriceOracle {
    fn price(&self, symbol: &AssetSymbol) -> Result<Decimal, LedgerError> {
        self.prices
            .get(symbol)
            .map(|price| *price)
            .filter(|price| *price > Decimal::ZERO)
            .ok_or_else(|| LedgerError::unsupported_asset(symbol.as_str()))
    }
}
