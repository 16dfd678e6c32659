//! Error types for the ledger
//!
//! This module defines every error the ledger can report. Business-rule
//! errors are detected before any write is made durable, so an operation
//! that fails leaves no partial state behind.
//!
//! # Error Categories
//!
//! - **Not found**: unknown or inactive accounts
//! - **Rejected**: insufficient funds/holdings, invalid amounts, same-account
//!   transfers, unsupported assets and other validation failures
//! - **Retryable**: transient storage conflicts (lock timeouts); the caller
//!   may resubmit the same request unchanged
//! - **Fatal**: storage faults, configuration and I/O problems

use crate::config::ConfigError;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use super::account::{AccountId, AccountStatus, OwnerId};

/// Reference to an account as the caller supplied it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRef {
    Id(AccountId),
    Number(String),
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Id(id) => write!(f, "#{}", id),
            AccountRef::Number(number) => f.write_str(number),
        }
    }
}

/// How the caller-facing layer should treat an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 404-class
    NotFound,
    /// 400-class; resubmit with corrected input
    Rejected,
    /// 5xx-class, safe to retry unchanged
    Retryable,
    /// 5xx-class, not retryable
    Fatal,
}

/// Main error type for the ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// No account with this reference, or the account is not active
    #[error("Account {account} not found or inactive")]
    AccountNotFound { account: AccountRef },

    /// Debit would take the balance below the minimum-balance policy
    #[error(
        "Insufficient funds in account {account}: balance {balance}, requested {requested}, minimum balance {minimum_balance}"
    )]
    InsufficientFunds {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
        minimum_balance: Decimal,
    },

    /// Sell quantity exceeds the held quantity
    #[error("Insufficient {symbol} holdings for owner {owner}: held {held}, requested {requested}")]
    InsufficientHoldings {
        owner: OwnerId,
        symbol: String,
        held: Decimal,
        requested: Decimal,
    },

    /// Amount is not positive, too precise, or below the minimum trade size
    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    /// Source and destination of a transfer are the same account
    #[error("Cannot transfer account {account} to itself")]
    SameAccount { account: AccountId },

    /// Asset symbol is not configured or has no price
    #[error("Unsupported asset '{symbol}'")]
    UnsupportedAsset { symbol: String },

    /// Account number does not match `ACC` followed by nine digits
    #[error("Invalid account number '{value}'")]
    InvalidAccountNumber { value: String },

    #[error("Description is {length} characters long, at most {max} allowed")]
    DescriptionTooLong { length: usize, max: usize },

    #[error("Account {account} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        account: AccountId,
        from: AccountStatus,
        to: AccountStatus,
    },

    /// Seeding an account whose id or number already exists
    #[error("Duplicate account {account}")]
    DuplicateAccount { account: AccountRef },

    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow { operation: String, account: AccountId },

    /// Lock timeout or serialization conflict; retry is safe
    #[error("Transient store error during {operation}: {reason}")]
    TransientStore { operation: String, reason: String },

    /// Unexpected storage failure; the unit was not applied
    #[error("Store fault: {message}")]
    StoreFault { message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error: {message}")]
    IoError { message: String },

    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },

    #[error("Invalid operation type '{op}'")]
    InvalidOperationType { op: String },

    #[error("{op} operation on account {account} requires {field}")]
    MissingField {
        op: String,
        account: AccountId,
        field: String,
    },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl LedgerError {
    /// Classify the error for the caller-facing layer
    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::AccountNotFound { .. } | LedgerError::FileNotFound { .. } => {
                ErrorClass::NotFound
            }
            LedgerError::TransientStore { .. } => ErrorClass::Retryable,
            LedgerError::StoreFault { .. }
            | LedgerError::Config(_)
            | LedgerError::IoError { .. } => ErrorClass::Fatal,
            _ => ErrorClass::Rejected,
        }
    }

    /// Only transient store conflicts may be retried unchanged
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound {
            account: AccountRef::Id(account),
        }
    }

    pub fn account_number_not_found(number: &str) -> Self {
        LedgerError::AccountNotFound {
            account: AccountRef::Number(number.to_string()),
        }
    }

    pub fn insufficient_funds(
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
        minimum_balance: Decimal,
    ) -> Self {
        LedgerError::InsufficientFunds {
            account,
            balance,
            requested,
            minimum_balance,
        }
    }

    pub fn insufficient_holdings(
        owner: OwnerId,
        symbol: &str,
        held: Decimal,
        requested: Decimal,
    ) -> Self {
        LedgerError::InsufficientHoldings {
            owner,
            symbol: symbol.to_string(),
            held,
            requested,
        }
    }

    pub fn invalid_amount(amount: impl fmt::Display, reason: &str) -> Self {
        LedgerError::InvalidAmount {
            amount: amount.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn same_account(account: AccountId) -> Self {
        LedgerError::SameAccount { account }
    }

    pub fn unsupported_asset(symbol: &str) -> Self {
        LedgerError::UnsupportedAsset {
            symbol: symbol.to_string(),
        }
    }

    pub fn invalid_account_number(value: &str) -> Self {
        LedgerError::InvalidAccountNumber {
            value: value.to_string(),
        }
    }

    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    pub fn transient(operation: &str, reason: &str) -> Self {
        LedgerError::TransientStore {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn store_fault(message: &str) -> Self {
        LedgerError::StoreFault {
            message: message.to_string(),
        }
    }

    pub fn parse_error(line: Option<u64>, message: &str) -> Self {
        LedgerError::ParseError {
            line,
            message: message.to_string(),
        }
    }

    pub fn missing_field(op: &str, account: AccountId, field: &str) -> Self {
        LedgerError::MissingField {
            op: op.to_string(),
            account,
            field: field.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::not_found_by_id(
        LedgerError::account_not_found(42),
        "Account #42 not found or inactive"
    )]
    #[case::not_found_by_number(
        LedgerError::account_number_not_found("ACC000000009"),
        "Account ACC000000009 not found or inactive"
    )]
    #[case::insufficient_funds(
        LedgerError::insufficient_funds(1, Decimal::new(0, 2), Decimal::new(1, 2), Decimal::new(0, 2)),
        "Insufficient funds in account 1: balance 0.00, requested 0.01, minimum balance 0.00"
    )]
    #[case::insufficient_holdings(
        LedgerError::insufficient_holdings(3, "BTC", Decimal::new(5, 1), Decimal::new(1, 0)),
        "Insufficient BTC holdings for owner 3: held 0.5, requested 1"
    )]
    #[case::same_account(LedgerError::same_account(5), "Cannot transfer account 5 to itself")]
    #[case::unsupported_asset(LedgerError::unsupported_asset("XRP"), "Unsupported asset 'XRP'")]
    #[case::parse_error_with_line(
        LedgerError::parse_error(Some(4), "bad field"),
        "CSV parse error at line 4: bad field"
    )]
    #[case::parse_error_without_line(
        LedgerError::parse_error(None, "bad field"),
        "CSV parse error: bad field"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case(LedgerError::account_not_found(1), ErrorClass::NotFound)]
    #[case(LedgerError::insufficient_funds(1, Decimal::ZERO, Decimal::ONE, Decimal::ZERO), ErrorClass::Rejected)]
    #[case(LedgerError::invalid_amount("0", "zero"), ErrorClass::Rejected)]
    #[case(LedgerError::same_account(1), ErrorClass::Rejected)]
    #[case(LedgerError::unsupported_asset("XRP"), ErrorClass::Rejected)]
    #[case(LedgerError::transient("transfer", "lock timeout"), ErrorClass::Retryable)]
    #[case(LedgerError::store_fault("poisoned"), ErrorClass::Fatal)]
    fn test_error_class(#[case] error: LedgerError, #[case] expected: ErrorClass) {
        assert_eq!(error.class(), expected);
        assert_eq!(error.is_retryable(), expected == ErrorClass::Retryable);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: LedgerError = io_error.into();
        assert!(matches!(error, LedgerError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
