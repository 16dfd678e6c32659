//! Atomic units and the balance mutator
//!
//! An atomic unit locks every row an operation may touch, lets the operation
//! stage its changes on working copies, and writes them all back together.
//! If the operation returns an error the unit is dropped and nothing it
//! staged becomes visible.
//!
//! # Lock order
//!
//! Account rows are locked in ascending id order, then at most one wallet
//! row. Every unit follows the same order, so two transfers referencing the
//! same pair of accounts in opposite directions cannot deadlock.
//!
//! # Example
//!
//! ```
//! use ledger_transfer_engine::core::atomic_unit::{execute, UnitScope};
//! use ledger_transfer_engine::core::{AssetWalletStore, LedgerStore};
//! use ledger_transfer_engine::types::{Account, AccountNumber, TransactionKind};
//! use rust_decimal::Decimal;
//!
//! let ledger = LedgerStore::default();
//! let wallets = AssetWalletStore::default();
//! let number = AccountNumber::parse("ACC000000001").unwrap();
//! ledger.insert_account(Account::new(1, number, 7)).unwrap();
//!
//! let committed = execute(&ledger, &wallets, UnitScope::accounts(&[1]), "deposit", |unit| {
//!     unit.apply_delta(1, Decimal::new(2500, 2), TransactionKind::Deposit, "Deposit")
//! })
//! .unwrap();
//!
//! assert_eq!(committed.value.balance_after, Decimal::new(2500, 2));
//! assert_eq!(ledger.account(1).unwrap().balance, Decimal::new(2500, 2));
//! ```

use crate::core::ledger_store::{lock_row, LedgerStore};
use crate::core::wallet_store::{AssetWalletStore, WalletRow};
use crate::types::money::{to_fiat, to_price};
use crate::types::{
    Account, AccountId, AssetWallet, LedgerError, TransactionKind, TransactionLogEntry, WalletKey,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::MutexGuard;

/// Rows an atomic unit will lock
#[derive(Debug, Clone, Default)]
pub struct UnitScope {
    accounts: Vec<AccountId>,
    wallet: Option<WalletKey>,
}

impl UnitScope {
    /// Scope over the given accounts, deduplicated and sorted
    pub fn accounts(ids: &[AccountId]) -> Self {
        let mut accounts = ids.to_vec();
        accounts.sort_unstable();
        accounts.dedup();
        UnitScope {
            accounts,
            wallet: None,
        }
    }

    /// Add one asset wallet row
    pub fn with_wallet(mut self, key: WalletKey) -> Self {
        self.wallet = Some(key);
        self
    }
}

/// Value returned by a committed unit, with the entries it appended
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<R> {
    pub value: R,
    pub entries: Vec<TransactionLogEntry>,
}

struct LockedAccount<'a> {
    guard: MutexGuard<'a, Account>,
    working: Account,
}

struct LockedWallet<'a> {
    guard: MutexGuard<'a, WalletRow>,
    working: AssetWallet,
}

/// Staging area of an in-flight unit
///
/// Reads through the unit see its own staged changes; nobody else sees them
/// until commit.
pub struct AtomicUnit<'a> {
    ledger: &'a LedgerStore,
    accounts: BTreeMap<AccountId, LockedAccount<'a>>,
    wallet: Option<LockedWallet<'a>>,
    entries: Vec<TransactionLogEntry>,
}

/// Run `f` as one atomic unit over `scope`
///
/// Accounts named in the scope but absent from the store are skipped when
/// locking; `apply_delta` on them reports `AccountNotFound`, which aborts
/// the unit like any other error. An aborted unit that created the wallet
/// row it locked removes that row again.
pub fn execute<R, F>(
    ledger: &LedgerStore,
    wallets: &AssetWalletStore,
    scope: UnitScope,
    operation: &str,
    f: F,
) -> Result<Committed<R>, LedgerError>
where
    F: FnOnce(&mut AtomicUnit<'_>) -> Result<R, LedgerError>,
{
    let result = run_unit(ledger, wallets, &scope, operation, f);
    if result.is_err() {
        if let Some(key) = &scope.wallet {
            wallets.discard_placeholder(key);
        }
    }
    result
}

fn run_unit<R, F>(
    ledger: &LedgerStore,
    wallets: &AssetWalletStore,
    scope: &UnitScope,
    operation: &str,
    f: F,
) -> Result<Committed<R>, LedgerError>
where
    F: FnOnce(&mut AtomicUnit<'_>) -> Result<R, LedgerError>,
{
    let account_rows: Vec<_> = scope
        .accounts
        .iter()
        .filter_map(|id| ledger.row(*id).map(|row| (*id, row)))
        .collect();
    let wallet_row = scope.wallet.as_ref().map(|key| wallets.row_for_update(key));

    let mut accounts = BTreeMap::new();
    for (id, row) in &account_rows {
        let guard = lock_row(row, ledger.lock_timeout(), operation)?;
        let working = (*guard).clone();
        accounts.insert(*id, LockedAccount { guard, working });
    }

    let wallet = match &wallet_row {
        Some(row) => {
            let guard = lock_row(row, wallets.lock_timeout(), operation)?;
            let working = guard.wallet.clone();
            Some(LockedWallet { guard, working })
        }
        None => None,
    };

    let mut unit = AtomicUnit {
        ledger,
        accounts,
        wallet,
        entries: Vec::new(),
    };

    let value = f(&mut unit)?;
    let entries = unit.commit(operation);

    Ok(Committed { value, entries })
}

impl<'a> AtomicUnit<'a> {
    /// Move `amount` (signed) on one account and stage its log entry
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if the account is not in scope, missing or not active
    /// - `InvalidAmount` for a zero amount, or one whose sign disagrees with
    ///   `kind` (debits are negative)
    /// - `InsufficientFunds` if a debit would leave the balance below the
    ///   account's minimum balance
    /// - `ArithmeticOverflow` if the balance cannot be represented
    pub fn apply_delta(
        &mut self,
        account_id: AccountId,
        amount: Decimal,
        kind: TransactionKind,
        description: &str,
    ) -> Result<TransactionLogEntry, LedgerError> {
        let locked = self
            .accounts
            .get_mut(&account_id)
            .filter(|locked| locked.working.is_active())
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;

        if amount.is_zero() {
            return Err(LedgerError::invalid_amount(amount, "amount must not be zero"));
        }
        if kind.is_debit() != amount.is_sign_negative() {
            return Err(LedgerError::invalid_amount(
                amount,
                &format!("sign does not match a {} movement", kind),
            ));
        }

        let account = &mut locked.working;
        let new_balance = account
            .balance
            .checked_add(amount)
            .map(to_fiat)
            .ok_or_else(|| LedgerError::arithmetic_overflow(kind.as_str(), account_id))?;

        if kind.is_debit() && new_balance < account.minimum_balance {
            return Err(LedgerError::insufficient_funds(
                account_id,
                account.balance,
                amount.abs(),
                account.minimum_balance,
            ));
        }

        account.balance = new_balance;

        let entry = TransactionLogEntry {
            id: self.ledger.next_transaction_id(),
            account_id,
            kind,
            amount: to_fiat(amount),
            description: description.to_string(),
            balance_after: new_balance,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Staged state of the wallet in scope
    pub fn holding(&self) -> Result<&AssetWallet, LedgerError> {
        self.wallet
            .as_ref()
            .map(|locked| &locked.working)
            .ok_or_else(|| LedgerError::store_fault("no wallet row in unit scope"))
    }

    /// Add `quantity` bought for `cost` at market `price`
    ///
    /// The average price becomes `price` for an empty wallet, otherwise the
    /// quantity-weighted mean `(old_qty * old_avg + cost) / new_qty`.
    pub fn credit_holding(
        &mut self,
        quantity: Decimal,
        cost: Decimal,
        price: Decimal,
    ) -> Result<&AssetWallet, LedgerError> {
        let locked = self
            .wallet
            .as_mut()
            .ok_or_else(|| LedgerError::store_fault("no wallet row in unit scope"))?;
        let wallet = &mut locked.working;
        let owner = wallet.owner;
        let overflow = || LedgerError::arithmetic_overflow("holding credit", owner);

        let new_quantity = wallet.quantity.checked_add(quantity).ok_or_else(overflow)?;

        wallet.average_price = if wallet.quantity.is_zero() {
            to_price(price)
        } else {
            let basis = wallet
                .quantity
                .checked_mul(wallet.average_price)
                .and_then(|held| held.checked_add(cost))
                .ok_or_else(overflow)?;
            to_price(basis.checked_div(new_quantity).ok_or_else(overflow)?)
        };
        wallet.quantity = new_quantity;

        Ok(wallet)
    }

    /// Remove `quantity` from the wallet; the average price is kept
    pub fn debit_holding(&mut self, quantity: Decimal) -> Result<&AssetWallet, LedgerError> {
        let locked = self
            .wallet
            .as_mut()
            .ok_or_else(|| LedgerError::store_fault("no wallet row in unit scope"))?;
        let wallet = &mut locked.working;

        if quantity > wallet.quantity {
            return Err(LedgerError::insufficient_holdings(
                wallet.owner,
                wallet.symbol.as_str(),
                wallet.quantity,
                quantity,
            ));
        }

        wallet.quantity -= quantity;
        Ok(wallet)
    }

    /// Write every staged row and append the staged entries
    ///
    /// All row locks are still held here and are released together when the
    /// unit drops at the end of this call.
    fn commit(mut self, operation: &str) -> Vec<TransactionLogEntry> {
        for locked in self.accounts.values_mut() {
            *locked.guard = locked.working.clone();
        }
        if let Some(locked) = self.wallet.as_mut() {
            locked.guard.wallet = locked.working.clone();
            locked.guard.materialized = true;
        }
        self.ledger.append_entries(&self.entries);

        tracing::debug!(
            operation,
            entries = self.entries.len(),
            "atomic unit committed"
        );
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountNumber, AccountStatus, AssetSymbol};
    use rstest::rstest;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn stores(accounts: &[(AccountId, &str, &str)]) -> (LedgerStore, AssetWalletStore) {
        let ledger = LedgerStore::default();
        for (id, balance, minimum) in accounts {
            let number = AccountNumber::parse(&format!("ACC{:09}", id)).unwrap();
            ledger
                .insert_account(
                    Account::new(*id, number, 10)
                        .with_balance(d(balance))
                        .with_minimum_balance(d(minimum)),
                )
                .unwrap();
        }
        (ledger, AssetWalletStore::default())
    }

    fn btc() -> AssetSymbol {
        AssetSymbol::parse("BTC").unwrap()
    }

    #[test]
    fn test_two_deltas_commit_together() {
        let (ledger, wallets) = stores(&[(1, "500.00", "0"), (2, "300.00", "0")]);

        let committed = execute(&ledger, &wallets, UnitScope::accounts(&[2, 1]), "transfer", |unit| {
            unit.apply_delta(1, d("-200.00"), TransactionKind::TransferOut, "out")?;
            unit.apply_delta(2, d("200.00"), TransactionKind::TransferIn, "in")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(committed.entries.len(), 2);
        assert_eq!(committed.entries[0].balance_after, d("300.00"));
        assert_eq!(committed.entries[1].balance_after, d("500.00"));
        assert_eq!(ledger.account(1).unwrap().balance, d("300.00"));
        assert_eq!(ledger.account(2).unwrap().balance, d("500.00"));
        assert!(ledger.verify_audit_trail(1).unwrap());
        assert!(ledger.verify_audit_trail(2).unwrap());
    }

    #[test]
    fn test_failure_after_first_delta_leaves_no_trace() {
        let (ledger, wallets) = stores(&[(1, "500.00", "0")]);

        let result = execute(&ledger, &wallets, UnitScope::accounts(&[1, 99]), "transfer", |unit| {
            unit.apply_delta(1, d("-200.00"), TransactionKind::TransferOut, "out")?;
            unit.apply_delta(99, d("200.00"), TransactionKind::TransferIn, "in")?;
            Ok(())
        });

        assert!(matches!(result, Err(LedgerError::AccountNotFound { .. })));
        assert_eq!(ledger.account(1).unwrap().balance, d("500.00"));
        assert!(ledger.history(1, None, 0).unwrap().is_empty());
    }

    #[test]
    fn test_debit_to_exact_minimum_allowed() {
        let (ledger, wallets) = stores(&[(1, "100.00", "25.00")]);

        let ok = execute(&ledger, &wallets, UnitScope::accounts(&[1]), "withdraw", |unit| {
            unit.apply_delta(1, d("-75.00"), TransactionKind::Withdraw, "w")
        });
        assert!(ok.is_ok());

        let rejected = execute(&ledger, &wallets, UnitScope::accounts(&[1]), "withdraw", |unit| {
            unit.apply_delta(1, d("-0.01"), TransactionKind::Withdraw, "w")
        });
        assert!(matches!(rejected, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(ledger.account(1).unwrap().balance, d("25.00"));
    }

    #[test]
    fn test_zero_and_inactive_rejected() {
        let (ledger, wallets) = stores(&[(1, "10.00", "0")]);

        let zero = execute(&ledger, &wallets, UnitScope::accounts(&[1]), "deposit", |unit| {
            unit.apply_delta(1, Decimal::ZERO, TransactionKind::Deposit, "d")
        });
        assert!(matches!(zero, Err(LedgerError::InvalidAmount { .. })));

        ledger.transition_status(1, AccountStatus::Frozen).unwrap();
        let frozen = execute(&ledger, &wallets, UnitScope::accounts(&[1]), "deposit", |unit| {
            unit.apply_delta(1, d("1.00"), TransactionKind::Deposit, "d")
        });
        assert!(matches!(frozen, Err(LedgerError::AccountNotFound { .. })));
    }

    #[test]
    fn test_holding_average_price() {
        let (ledger, wallets) = stores(&[]);
        let scope = || UnitScope::default().with_wallet((10, btc()));

        execute(&ledger, &wallets, scope(), "buy", |unit| {
            unit.credit_holding(d("1.0"), d("100"), d("100")).map(|_| ())
        })
        .unwrap();
        execute(&ledger, &wallets, scope(), "buy", |unit| {
            unit.credit_holding(d("3.0"), d("600"), d("200")).map(|_| ())
        })
        .unwrap();

        let wallet = wallets.wallet(10, &btc()).unwrap().unwrap();
        assert_eq!(wallet.quantity, d("4.0"));
        assert_eq!(wallet.average_price, d("175.00000000"));

        execute(&ledger, &wallets, scope(), "sell", |unit| {
            unit.debit_holding(d("2.5")).map(|_| ())
        })
        .unwrap();
        let wallet = wallets.wallet(10, &btc()).unwrap().unwrap();
        assert_eq!(wallet.quantity, d("1.5"));
        assert_eq!(wallet.average_price, d("175.00000000"));
    }

    #[test]
    fn test_oversell_and_aborted_first_buy_leave_no_wallet() {
        let (ledger, wallets) = stores(&[(1, "10.00", "0")]);

        let oversell = execute(&ledger, &wallets, UnitScope::default().with_wallet((10, btc())), "sell", |unit| {
            unit.debit_holding(d("0.1")).map(|_| ())
        });
        assert!(matches!(oversell, Err(LedgerError::InsufficientHoldings { .. })));

        let scope = UnitScope::accounts(&[1]).with_wallet((10, btc()));
        let aborted = execute(&ledger, &wallets, scope, "buy", |unit| {
            unit.credit_holding(d("0.001"), d("45.23"), d("45230"))?;
            unit.apply_delta(1, d("-45.23"), TransactionKind::CryptoPurchase, "buy")?;
            Ok(())
        });
        assert!(matches!(aborted, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(wallets.wallet(10, &btc()).unwrap(), None);
        assert_eq!(wallets.row_count(), 0);
    }

    #[test]
    fn test_aborted_unit_keeps_committed_wallet_row() {
        let (ledger, wallets) = stores(&[(1, "100.00", "0")]);
        let scope = || UnitScope::accounts(&[1]).with_wallet((10, btc()));

        execute(&ledger, &wallets, scope(), "buy", |unit| {
            unit.credit_holding(d("0.001"), d("45.23"), d("45230"))?;
            unit.apply_delta(1, d("-45.23"), TransactionKind::CryptoPurchase, "buy")?;
            Ok(())
        })
        .unwrap();

        let aborted = execute(&ledger, &wallets, scope(), "sell", |unit| {
            unit.debit_holding(d("1")).map(|_| ())
        });
        assert!(matches!(aborted, Err(LedgerError::InsufficientHoldings { .. })));
        assert_eq!(wallets.row_count(), 1);
        assert_eq!(wallets.wallet(10, &btc()).unwrap().unwrap().quantity, d("0.001"));
    }

    #[rstest]
    #[case::negative_deposit(TransactionKind::Deposit, "-5.00")]
    #[case::positive_withdraw(TransactionKind::Withdraw, "5.00")]
    #[case::positive_transfer_out(TransactionKind::TransferOut, "5.00")]
    #[case::negative_sale_credit(TransactionKind::CryptoSale, "-5.00")]
    fn test_delta_sign_must_match_kind(#[case] kind: TransactionKind, #[case] amount: &str) {
        let (ledger, wallets) = stores(&[(1, "10.00", "0")]);

        let result = execute(&ledger, &wallets, UnitScope::accounts(&[1]), "mismatch", |unit| {
            unit.apply_delta(1, d(amount), kind, "x")
        });

        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
        assert_eq!(ledger.account(1).unwrap().balance, d("10.00"));
        assert!(ledger.history(1, None, 0).unwrap().is_empty());
    }
}
