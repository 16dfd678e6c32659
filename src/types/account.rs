//! Account-related types for the ledger
//!
//! This module defines the Account row, its lifecycle status and the
//! externally visible account number.

use super::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Internal account identifier
pub type AccountId = u32;

/// Identifier of the customer owning an account (and its asset wallets)
pub type OwnerId = u32;

/// Lifecycle status of an account
///
/// Only `Active` accounts accept movements. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
    Frozen,
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Frozen => "frozen",
            AccountStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "frozen" => Ok(AccountStatus::Frozen),
            "closed" => Ok(AccountStatus::Closed),
            other => Err(LedgerError::parse_error(
                None,
                &format!("unknown account status '{}'", other),
            )),
        }
    }
}

/// Customer-facing account number, always `ACC` followed by nine digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    const PREFIX: &'static str = "ACC";
    const DIGITS: usize = 9;

    /// Parse and validate an account number.
    pub fn parse(value: &str) -> Result<Self, LedgerError> {
        let digits = value
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| LedgerError::invalid_account_number(value))?;

        if digits.len() != Self::DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::invalid_account_number(value));
        }

        Ok(AccountNumber(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccountNumber::parse(&value)
    }
}

impl From<AccountNumber> for String {
    fn from(number: AccountNumber) -> Self {
        number.0
    }
}

/// Account row
///
/// Balances are fiat amounts with two fractional digits. The row is only
/// mutated by the balance mutator inside an atomic unit, and by status
/// transitions (freeze, close).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub number: AccountNumber,
    pub owner: OwnerId,

    /// Current balance
    pub balance: Decimal,

    /// Lowest balance the account may hold after a debit
    pub minimum_balance: Decimal,

    pub status: AccountStatus,
}

impl Account {
    /// Create an active account with a zero balance and no minimum-balance policy
    pub fn new(id: AccountId, number: AccountNumber, owner: OwnerId) -> Self {
        Account {
            id,
            number,
            owner,
            balance: Decimal::new(0, 2),
            minimum_balance: Decimal::new(0, 2),
            status: AccountStatus::Active,
        }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_minimum_balance(mut self, minimum_balance: Decimal) -> Self {
        self.minimum_balance = minimum_balance;
        self
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}
