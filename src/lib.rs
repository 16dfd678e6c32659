//! Ledger Transfer Engine Library
//! # Overview
//!
//! An in-process account ledger with all-or-nothing money movement: deposits,
//! withdrawals, account-to-account transfers and crypto conversions against
//! per-owner asset wallets, followed by post-commit anomaly scoring.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, TransactionLogEntry, AssetWallet, RiskSignal, errors)
//! - [`config`] - TOML configuration
//! - [`core`] - Business logic components:
//!   - [`core::ledger_store`] - Account rows and the append-only transaction log
//!   - [`core::atomic_unit`] - Row-locked all-or-nothing units and the balance mutator
//!   - [`core::wallet_store`] - Asset wallets keyed by owner and symbol
//!   - [`core::engine`] - Deposits, withdrawals, transfers and crypto conversions
//!   - [`core::risk`] - Risk scoring, signals, alerts and freezes
//! - [`io`] - CSV seed tables, operation streams and output
//! - [`strategy`] - Sync and async replay pipelines
//! - [`cli`] - CLI arguments parsing
//!
//! # Guarantees
//!
//! - Every operation commits all of its balance changes, wallet changes and
//!   log entries, or none of them.
//! - A committed debit never takes a balance below the account's minimum.
//! - Each account's log replays to its balance.
//! - Transfers conserve money; crypto trades move value between an account
//!   and its owner's wallet at the quoted price.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use crate::config::LedgerConfig;
pub use crate::core::{AssetWalletStore, LedgerStore, RiskScorer, TransferEngine};
pub use io::{write_accounts_csv, write_wallets_csv};
pub use types::{
    Account, AccountId, AccountNumber, AccountStatus, AssetSymbol, AssetWallet, LedgerError,
    OperationRecord, OperationType, RiskSignal, RiskTier, TransactionLogEntry,
};
