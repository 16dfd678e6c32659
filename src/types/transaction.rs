//! Transaction-related types for the ledger
//!
//! This module defines the immutable transaction log entry written by every
//! balance movement, the operation requests accepted by the transfer engine,
//! and the receipts it hands back.

use super::account::{AccountId, AccountNumber};
use super::wallet::AssetSymbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction log identifier, assigned from a store-wide sequence
pub type TransactionId = u64;

/// Kind of balance movement recorded in the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    TransferIn,
    TransferOut,
    CryptoPurchase,
    CryptoSale,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::CryptoPurchase => "crypto_purchase",
            TransactionKind::CryptoSale => "crypto_sale",
        }
    }

    /// Whether the movement takes money out of the account
    pub fn is_debit(&self) -> bool {
        matches!(
            self,
            TransactionKind::Withdraw | TransactionKind::TransferOut | TransactionKind::CryptoPurchase
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one balance movement
///
/// `amount` is signed (debits negative). `balance_after` is the account
/// balance right after this entry was applied; it is never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Direction of a crypto conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    /// Spend fiat, receive the asset
    Buy,
    /// Spend the asset, receive fiat
    Sell,
}

/// Operation types accepted by the transfer engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Deposit,
    Withdraw,
    Transfer,
    Buy,
    Sell,
}

/// A single operation request, as replayed from an operation stream
///
/// `target` is the destination account number for transfers and `asset`
/// the symbol for buy/sell. For buys `amount` is in fiat, for sells it is
/// an asset quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    pub op: OperationType,
    pub account: AccountId,
    pub target: Option<String>,
    pub asset: Option<String>,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Result of a deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementReceipt {
    pub transaction_id: TransactionId,
    pub new_balance: Decimal,
}

/// Result of an account-to-account transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub out_transaction_id: TransactionId,
    pub in_transaction_id: TransactionId,
    pub new_source_balance: Decimal,
    pub destination: AccountNumber,
}

/// Result of a crypto buy or sell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoTradeReceipt {
    pub transaction_id: TransactionId,
    pub symbol: AssetSymbol,
    pub direction: TradeDirection,
    pub crypto_amount: Decimal,
    pub usd_amount: Decimal,
    pub price_per_unit: Decimal,
    pub new_account_balance: Decimal,
    /// Quantity held after the trade
    pub holding_after: Decimal,
}

/// Outcome of any engine operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Movement(MovementReceipt),
    Transfer(TransferReceipt),
    Trade(CryptoTradeReceipt),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TransactionKind::Deposit, "deposit", false)]
    #[case(TransactionKind::Withdraw, "withdraw", true)]
    #[case(TransactionKind::TransferIn, "transfer_in", false)]
    #[case(TransactionKind::TransferOut, "transfer_out", true)]
    #[case(TransactionKind::CryptoPurchase, "crypto_purchase", true)]
    #[case(TransactionKind::CryptoSale, "crypto_sale", false)]
    fn test_kind_labels(
        #[case] kind: TransactionKind,
        #[case] label: &str,
        #[case] debit: bool,
    ) {
        assert_eq!(kind.to_string(), label);
        assert_eq!(kind.is_debit(), debit);
    }
}
