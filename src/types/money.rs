//! Fixed-point money helpers
//!
//! Every amount that moves through the ledger is a `Decimal` with a fixed
//! scale: 2 fractional digits for fiat, a per-asset precision for crypto
//! quantities and 8 digits for prices. Binary floating point never appears.

use super::error::LedgerError;
use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits carried by fiat balances and amounts
pub const FIAT_SCALE: u32 = 2;

/// Fractional digits carried by asset prices (average and market)
pub const PRICE_SCALE: u32 = 8;

/// Round to fiat precision using round-half-even and pin the scale to 2.
pub fn to_fiat(value: Decimal) -> Decimal {
    round_half_even(value, FIAT_SCALE)
}

/// Round to price precision using round-half-even and pin the scale to 8.
pub fn to_price(value: Decimal) -> Decimal {
    round_half_even(value, PRICE_SCALE)
}

/// Round half-even to `scale` digits and pin the scale.
pub fn round_half_even(value: Decimal, scale: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(scale);
    rounded
}

/// Truncate toward zero to `scale` digits and pin the scale.
///
/// Used for asset quantities bought with fiat, so a purchase never credits
/// more units than were paid for.
pub fn truncate_to(value: Decimal, scale: u32) -> Decimal {
    let mut truncated = value.round_dp_with_strategy(scale, RoundingStrategy::ToZero);
    truncated.rescale(scale);
    truncated
}

/// Validate a caller-supplied fiat amount.
///
/// The amount must be strictly positive and carry no more than two
/// significant fractional digits (`10.10` is fine, `10.101` is not).
pub fn fiat_amount(raw: Decimal) -> Result<Decimal, LedgerError> {
    validated(raw, FIAT_SCALE)
}

/// Validate a caller-supplied asset quantity against the asset's precision.
pub fn asset_amount(raw: Decimal, precision: u32) -> Result<Decimal, LedgerError> {
    validated(raw, precision)
}

fn validated(raw: Decimal, scale: u32) -> Result<Decimal, LedgerError> {
    if raw <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(raw, "amount must be greater than zero"));
    }
    if raw.normalize().scale() > scale {
        return Err(LedgerError::invalid_amount(
            raw,
            &format!("amount carries more than {} fractional digits", scale),
        ));
    }
    let mut fixed = raw;
    fixed.rescale(scale);
    Ok(fixed)
}
