//! Ledger store
//!
//! This module provides the `LedgerStore`, the durable home of account rows
//! and the append-only transaction log.
//!
//! # Design
//!
//! Account rows live behind individual mutexes (`Arc<Mutex<Account>>`) held
//! in a `DashMap`. The map only hands out row handles; it is never held
//! while a row lock is awaited. Atomic units (see `atomic_unit`) lock every
//! row they touch in ascending account id order, so two units touching the
//! same pair of accounts can never deadlock. A row lock that cannot be
//! acquired within the configured timeout surfaces as a retryable
//! `TransientStore` error.
//!
//! The transaction log is keyed by account and only ever appended to, by a
//! committing unit that still holds the account's row lock. Reading a row
//! lock and then the log therefore yields a consistent view of balance and
//! history.

use crate::config::StoreConfig;
use crate::types::{
    Account, AccountId, AccountNumber, AccountRef, AccountStatus, LedgerError, TransactionId,
    TransactionLogEntry,
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

/// Default page size of `history`
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Largest page `history` will return
pub const MAX_HISTORY_LIMIT: usize = 500;

/// A lockable storage row
pub(crate) type Row<T> = Arc<Mutex<T>>;

/// Acquire a row lock, giving up after `timeout`
///
/// A poisoned lock means a previous holder panicked mid-update; that is a
/// store fault, not a conflict, and is not retryable.
pub(crate) fn lock_row<'a, T>(
    row: &'a Mutex<T>,
    timeout: Duration,
    operation: &str,
) -> Result<MutexGuard<'a, T>, LedgerError> {
    let deadline = Instant::now() + timeout;
    let mut spins = 0u32;

    loop {
        match row.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return Err(LedgerError::transient(operation, "row lock timeout"));
                }
                if spins < 64 {
                    spins += 1;
                    std::hint::spin_loop();
                } else {
                    thread::sleep(Duration::from_micros(50));
                }
            }
            Err(TryLockError::Poisoned(_)) => {
                return Err(LedgerError::store_fault(&format!(
                    "row lock poisoned during {}",
                    operation
                )))
            }
        }
    }
}

/// Account rows and the transaction log
#[derive(Debug)]
pub struct LedgerStore {
    accounts: DashMap<AccountId, Row<Account>>,
    numbers: DashMap<AccountNumber, AccountId>,
    log: DashMap<AccountId, Vec<TransactionLogEntry>>,
    next_transaction_id: AtomicU64,
    lock_timeout: Duration,
}

impl LedgerStore {
    pub fn new(config: &StoreConfig) -> Self {
        LedgerStore {
            accounts: DashMap::new(),
            numbers: DashMap::new(),
            log: DashMap::new(),
            next_transaction_id: AtomicU64::new(1),
            lock_timeout: config.lock_timeout(),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Register an account opened elsewhere
    ///
    /// Rejects a second account with the same id or the same number.
    pub fn insert_account(&self, account: Account) -> Result<(), LedgerError> {
        let id = account.id;
        let number = account.number.clone();

        if self.accounts.contains_key(&id) {
            return Err(LedgerError::DuplicateAccount {
                account: AccountRef::Id(id),
            });
        }

        match self.numbers.entry(number.clone()) {
            Entry::Occupied(_) => {
                return Err(LedgerError::DuplicateAccount {
                    account: AccountRef::Number(number.to_string()),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        match self.accounts.entry(id) {
            Entry::Occupied(_) => {
                self.numbers.remove(&number);
                Err(LedgerError::DuplicateAccount {
                    account: AccountRef::Id(id),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(account)));
                Ok(())
            }
        }
    }

    pub(crate) fn row(&self, id: AccountId) -> Option<Row<Account>> {
        self.accounts.get(&id).map(|row| Arc::clone(row.value()))
    }

    /// Map a customer-facing account number to the internal id
    pub fn resolve_number(&self, number: &AccountNumber) -> Option<AccountId> {
        self.numbers.get(number).map(|id| *id)
    }

    /// Current state of one account
    pub fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
        let row = self
            .row(id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;
        let guard = lock_row(&row, self.lock_timeout, "account read")?;
        Ok((*guard).clone())
    }

    pub fn account_by_number(&self, number: &str) -> Result<Account, LedgerError> {
        let number = AccountNumber::parse(number)?;
        let id = self
            .resolve_number(&number)
            .ok_or_else(|| LedgerError::account_number_not_found(number.as_str()))?;
        self.account(id)
    }

    /// Consistent read of several accounts
    ///
    /// All rows are locked together in ascending id order, so the result
    /// never mixes pre- and post-commit state of one atomic unit.
    pub fn snapshot(&self, ids: &[AccountId]) -> Result<Vec<Account>, LedgerError> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let rows = ids
            .iter()
            .map(|id| self.row(*id).ok_or_else(|| LedgerError::account_not_found(*id)))
            .collect::<Result<Vec<_>, _>>()?;

        let guards = rows
            .iter()
            .map(|row| lock_row(row, self.lock_timeout, "snapshot"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(guards.iter().map(|guard| (**guard).clone()).collect())
    }

    /// All accounts sorted by id
    ///
    /// Like `snapshot`, every row stays locked until all are copied, so the
    /// listing is consistent while transfers commit concurrently.
    pub fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut rows: Vec<(AccountId, Row<Account>)> = self
            .accounts
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        rows.sort_by_key(|(id, _)| *id);

        let guards = rows
            .iter()
            .map(|(_, row)| lock_row(row, self.lock_timeout, "account listing"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(guards.iter().map(|guard| (**guard).clone()).collect())
    }

    pub(crate) fn next_transaction_id(&self) -> TransactionId {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Append committed entries; the caller still holds the rows' locks
    pub(crate) fn append_entries(&self, entries: &[TransactionLogEntry]) {
        for entry in entries {
            self.log
                .entry(entry.account_id)
                .or_default()
                .push(entry.clone());
        }
    }

    /// Page of an account's log, newest first
    pub fn history(
        &self,
        id: AccountId,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<TransactionLogEntry>, LedgerError> {
        if !self.accounts.contains_key(&id) {
            return Err(LedgerError::account_not_found(id));
        }
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);

        Ok(self
            .log
            .get(&id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Balance after every movement, oldest first
    pub fn balance_history(
        &self,
        id: AccountId,
    ) -> Result<Vec<(DateTime<Utc>, Decimal)>, LedgerError> {
        if !self.accounts.contains_key(&id) {
            return Err(LedgerError::account_not_found(id));
        }

        Ok(self
            .log
            .get(&id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| (entry.created_at, entry.balance_after))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Check that the log reproduces the live balance
    ///
    /// Every entry's `balance_after` must equal the previous entry's
    /// `balance_after` plus its own amount, and the last one must equal the
    /// current balance.
    pub fn verify_audit_trail(&self, id: AccountId) -> Result<bool, LedgerError> {
        let row = self
            .row(id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;
        let account = lock_row(&row, self.lock_timeout, "audit")?;

        let Some(entries) = self.log.get(&id) else {
            return Ok(true);
        };

        let chained = entries
            .windows(2)
            .all(|pair| pair[0].balance_after + pair[1].amount == pair[1].balance_after);
        let matches_live = entries
            .last()
            .is_none_or(|last| last.balance_after == account.balance);

        Ok(chained && matches_live)
    }

    /// Number of the account's entries written in `[from, to]`
    pub fn count_entries_between(
        &self,
        id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> usize {
        self.log
            .get(&id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.created_at >= from && e.created_at <= to)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Mean absolute amount of the account's entries written in `[from, to]`
    pub fn average_amount_between(
        &self,
        id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Option<Decimal> {
        let entries = self.log.get(&id)?;
        let recent: Vec<Decimal> = entries
            .iter()
            .filter(|e| e.created_at >= from && e.created_at <= to)
            .map(|e| e.amount.abs())
            .collect();

        if recent.is_empty() {
            return None;
        }
        let total: Decimal = recent.iter().sum();
        total.checked_div(Decimal::from(recent.len()))
    }

    /// Move an account to another status
    ///
    /// Returns `false` when the account already has that status. `closed`
    /// is terminal.
    pub fn transition_status(
        &self,
        id: AccountId,
        to: AccountStatus,
    ) -> Result<bool, LedgerError> {
        let row = self
            .row(id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;
        let mut account = lock_row(&row, self.lock_timeout, "status transition")?;

        let from = account.status;
        if from == to {
            return Ok(false);
        }
        if from == AccountStatus::Closed {
            return Err(LedgerError::InvalidStatusTransition { account: id, from, to });
        }

        account.status = to;
        tracing::info!(account = id, %from, %to, "account status changed");
        Ok(true)
    }

    /// Freeze an active account
    ///
    /// Idempotent: returns `false` and changes nothing unless the account
    /// was active.
    pub fn freeze(&self, id: AccountId) -> Result<bool, LedgerError> {
        let row = self
            .row(id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;
        let mut account = lock_row(&row, self.lock_timeout, "freeze")?;

        if account.status != AccountStatus::Active {
            return Ok(false);
        }
        account.status = AccountStatus::Frozen;
        Ok(true)
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}
