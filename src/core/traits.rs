//! Core traits at the engine's seams
//!
//! The transfer engine depends on two collaborators it does not own: a
//! source of current asset prices, and a sink that receives committed log
//! entries for post-commit risk scoring. Both can be swapped between the
//! synchronous pipeline (inline scoring) and the asynchronous one (queued
//! scoring on a background task).

use crate::types::{AssetSymbol, LedgerError, TransactionLogEntry};
use rust_decimal::Decimal;

/// Source of current asset prices, in fiat per unit
pub trait PriceOracle: Send + Sync {
    /// Current price of `symbol`
    ///
    /// Returns `UnsupportedAsset` when no price is known.
    fn price(&self, symbol: &AssetSymbol) -> Result<Decimal, LedgerError>;
}

/// Receiver of committed log entries for risk scoring
///
/// Called after an atomic unit commits, never before. Implementations must
/// not fail the caller: the movement is already durable, so scoring errors
/// are logged and (for queued dispatchers) retried.
pub trait RiskDispatcher: Send + Sync {
    fn dispatch(&self, entries: &[TransactionLogEntry]);
}

/// Dispatcher that drops every entry
///
/// Useful where scoring is irrelevant, such as bulk replays in benchmarks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRiskDispatcher;

impl RiskDispatcher for NoopRiskDispatcher {
    fn dispatch(&self, _entries: &[TransactionLogEntry]) {}
}
