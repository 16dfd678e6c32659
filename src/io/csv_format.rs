//! CSV format handling for seed accounts, operations and output
//!
//! This module centralizes all CSV format concerns, providing:
//! - `OperationCsvRecord` and its conversion to `OperationRecord`
//! - `AccountCsvRecord` and its conversion to a seeded `Account`
//! - Account and wallet output serialization
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::types::money::FIAT_SCALE;
use crate::types::{
    Account, AccountId, AccountNumber, AccountStatus, AssetWallet, LedgerError, OperationRecord,
    OperationType, OwnerId,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// One row of an operation stream
///
/// Columns: `op, account, target, asset, amount, description`. Only `op`,
/// `account` and `amount` are needed for every row.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OperationCsvRecord {
    pub op: String,
    pub account: AccountId,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One row of the seed account table
///
/// Columns: `id, number, owner, balance, minimum_balance, status`. The
/// minimum balance defaults to zero and the status to `active`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountCsvRecord {
    pub id: AccountId,
    pub number: String,
    pub owner: OwnerId,
    pub balance: String,
    #[serde(default)]
    pub minimum_balance: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

fn parse_decimal(raw: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(raw.trim())
        .map_err(|_| LedgerError::invalid_amount(raw.trim(), "not a decimal number"))
}

/// Convert an `OperationCsvRecord` to an `OperationRecord`
///
/// Checks the operation name and the presence of the columns it needs.
/// Amount rules (sign, precision, minimums) are the engine's business.
pub fn convert_operation_record(
    csv_record: OperationCsvRecord,
) -> Result<OperationRecord, LedgerError> {
    let op = match csv_record.op.trim().to_lowercase().as_str() {
        "deposit" => OperationType::Deposit,
        "withdraw" | "withdrawal" => OperationType::Withdraw,
        "transfer" => OperationType::Transfer,
        "buy" => OperationType::Buy,
        "sell" => OperationType::Sell,
        _ => {
            return Err(LedgerError::InvalidOperationType {
                op: csv_record.op,
            })
        }
    };
    let name = csv_record.op.trim().to_lowercase();

    let amount = match non_empty(csv_record.amount) {
        Some(raw) => parse_decimal(&raw)?,
        None => return Err(LedgerError::missing_field(&name, csv_record.account, "amount")),
    };

    let target = non_empty(csv_record.target);
    if op == OperationType::Transfer && target.is_none() {
        return Err(LedgerError::missing_field(&name, csv_record.account, "target"));
    }

    let asset = non_empty(csv_record.asset);
    if matches!(op, OperationType::Buy | OperationType::Sell) && asset.is_none() {
        return Err(LedgerError::missing_field(&name, csv_record.account, "asset"));
    }

    Ok(OperationRecord {
        op,
        account: csv_record.account,
        target,
        asset,
        amount,
        description: non_empty(csv_record.description),
    })
}

/// Convert an `AccountCsvRecord` to an `Account`
pub fn convert_account_record(csv_record: AccountCsvRecord) -> Result<Account, LedgerError> {
    let number = AccountNumber::parse(csv_record.number.trim())?;
    let balance = fiat(&csv_record.balance)?;
    let minimum_balance = match non_empty(csv_record.minimum_balance) {
        Some(raw) => fiat(&raw)?,
        None => fiat("0")?,
    };
    if minimum_balance < Decimal::ZERO {
        return Err(LedgerError::invalid_amount(
            minimum_balance,
            "minimum balance must not be negative",
        ));
    }
    let status = match non_empty(csv_record.status) {
        Some(raw) => AccountStatus::from_str(&raw)?,
        None => AccountStatus::Active,
    };

    Ok(Account::new(csv_record.id, number, csv_record.owner)
        .with_balance(balance)
        .with_minimum_balance(minimum_balance)
        .with_status(status))
}

/// Seeded balances may be zero or negative but carry fiat precision
fn fiat(raw: &str) -> Result<Decimal, LedgerError> {
    let mut value = parse_decimal(raw)?;
    if value.normalize().scale() > FIAT_SCALE {
        return Err(LedgerError::invalid_amount(
            raw.trim(),
            "amount carries more than 2 fractional digits",
        ));
    }
    value.rescale(FIAT_SCALE);
    Ok(value)
}

/// Write account states to CSV format
///
/// Columns: `id, number, owner, balance, minimum_balance, status`. Accounts
/// are sorted by id for deterministic output.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["id", "number", "owner", "balance", "minimum_balance", "status"])?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    for account in sorted_accounts {
        writer.write_record(&[
            account.id.to_string(),
            account.number.to_string(),
            account.owner.to_string(),
            format!("{:.2}", account.balance),
            format!("{:.2}", account.minimum_balance),
            account.status.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write wallet states to CSV format
///
/// Columns: `owner, symbol, quantity, average_price`, sorted by owner then
/// symbol. Quantities keep their asset precision.
pub fn write_wallets_csv(wallets: &[AssetWallet], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["owner", "symbol", "quantity", "average_price"])?;

    let mut sorted_wallets = wallets.to_vec();
    sorted_wallets.sort_by_key(|wallet| wallet.key());

    for wallet in sorted_wallets {
        writer.write_record(&[
            wallet.owner.to_string(),
            wallet.symbol.to_string(),
            wallet.quantity.to_string(),
            format!("{:.8}", wallet.average_price),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
