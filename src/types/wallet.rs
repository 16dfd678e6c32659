//! Asset wallet types
//!
//! A wallet holds one non-fiat asset for one owner. Quantities use the
//! asset's precision; the average price uses `PRICE_SCALE`.

use super::account::OwnerId;
use super::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper-case ticker symbol of a supported asset (e.g. `BTC`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetSymbol(String);

impl AssetSymbol {
    /// Normalize a symbol: trimmed, upper-cased, alphanumeric, 2 to 10 chars.
    pub fn parse(value: &str) -> Result<Self, LedgerError> {
        let symbol = value.trim().to_uppercase();
        let well_formed = (2..=10).contains(&symbol.len())
            && symbol.bytes().all(|b| b.is_ascii_alphanumeric());

        if !well_formed {
            return Err(LedgerError::unsupported_asset(value));
        }
        Ok(AssetSymbol(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AssetSymbol {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AssetSymbol::parse(&value)
    }
}

impl From<AssetSymbol> for String {
    fn from(symbol: AssetSymbol) -> Self {
        symbol.0
    }
}

/// Wallet rows are keyed by owner and symbol
pub type WalletKey = (OwnerId, AssetSymbol);

/// Holding of one asset by one owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetWallet {
    pub owner: OwnerId,
    pub symbol: AssetSymbol,

    /// Held quantity, never negative
    pub quantity: Decimal,

    /// Volume-weighted average acquisition price
    ///
    /// Recomputed on every purchase, left untouched on sale.
    pub average_price: Decimal,
}

impl AssetWallet {
    pub fn empty(owner: OwnerId, symbol: AssetSymbol) -> Self {
        AssetWallet {
            owner,
            symbol,
            quantity: Decimal::ZERO,
            average_price: Decimal::ZERO,
        }
    }

    pub fn key(&self) -> WalletKey {
        (self.owner, self.symbol.clone())
    }
}

/// Valuation of a holding at the current market price
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingValuation {
    pub symbol: AssetSymbol,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("btc", "BTC")]
    #[case(" eth ", "ETH")]
    #[case("DOT", "DOT")]
    fn test_symbol_normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(AssetSymbol::parse(input).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("B")]
    #[case("BTC-USD")]
    #[case("VERYLONGSYMBOL")]
    fn test_symbol_rejects_malformed(#[case] input: &str) {
        assert!(matches!(
            AssetSymbol::parse(input),
            Err(LedgerError::UnsupportedAsset { .. })
        ));
    }
}
