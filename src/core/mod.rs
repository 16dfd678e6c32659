//! Core business logic module
//!
//! This module contains the ledger components:
//! - `ledger_store` - Account rows and the append-only transaction log
//! - `wallet_store` - Per-owner asset wallets
//! - `atomic_unit` - All-or-nothing units and the balance mutator
//! - `engine` - Deposits, withdrawals, transfers and crypto conversions
//! - `risk` - Post-commit anomaly scoring and risk signals
//! - `pricing` - Asset catalog and reference prices
//! - `traits` - Seams for price sources and risk dispatch
//! - `async` - Batch processor and background risk worker

pub mod r#async;
pub mod atomic_unit;
pub mod engine;
pub mod ledger_store;
pub mod pricing;
pub mod risk;
pub mod traits;
pub mod wallet_store;

pub use atomic_unit::{execute, AtomicUnit, Committed, UnitScope};
pub use engine::TransferEngine;
pub use ledger_store::LedgerStore;
pub use pricing::{AssetCatalog, FixedPriceOracle};
pub use r#async::{BatchProcessor, QueuedRiskDispatcher, RiskWorker};
pub use risk::{InlineRiskDispatcher, RiskInputs, RiskScorer, RiskSignalStore};
pub use traits::{NoopRiskDispatcher, PriceOracle, RiskDispatcher};
pub use wallet_store::AssetWalletStore;
