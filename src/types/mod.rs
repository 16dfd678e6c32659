//! Types module
//!
//! Contains core data structures used throughout the ledger:
//! - `account`: Account rows, status and account numbers
//! - `transaction`: Transaction log entries, operation requests and receipts
//! - `wallet`: Asset wallets and symbols
//! - `risk`: Risk signals and tiers
//! - `money`: Fixed-point rounding and amount validation
//! - `error`: Error types for the ledger

pub mod account;
pub mod error;
pub mod money;
pub mod risk;
pub mod transaction;
pub mod wallet;

pub use account::{Account, AccountId, AccountNumber, AccountStatus, OwnerId};
pub use error::{AccountRef, ErrorClass, LedgerError};
pub use risk::{FreezeAction, RiskSignal, RiskTier};
pub use transaction::{
    CryptoTradeReceipt, MovementReceipt, OperationOutcome, OperationRecord, OperationType,
    TradeDirection, TransactionId, TransactionKind, TransactionLogEntry, TransferReceipt,
};
pub use wallet::{AssetSymbol, AssetWallet, HoldingValuation, WalletKey};
