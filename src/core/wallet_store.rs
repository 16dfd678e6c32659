//! Asset wallet store
//!
//! Holds one row per (owner, symbol). Rows are created lazily the first
//! time an atomic unit asks for them, but stay invisible to readers until a
//! unit commits into them, so an aborted first purchase leaves no wallet
//! behind. The aborted unit then discards the empty row.

use crate::config::StoreConfig;
use crate::core::ledger_store::{lock_row, Row};
use crate::types::{AssetSymbol, AssetWallet, LedgerError, OwnerId, WalletKey};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
pub(crate) struct WalletRow {
    pub(crate) wallet: AssetWallet,
    /// Set by the first committed unit touching the row
    pub(crate) materialized: bool,
}

/// Wallet rows keyed by owner and symbol
#[derive(Debug)]
pub struct AssetWalletStore {
    rows: DashMap<WalletKey, Row<WalletRow>>,
    lock_timeout: Duration,
}

impl AssetWalletStore {
    pub fn new(config: &StoreConfig) -> Self {
        AssetWalletStore {
            rows: DashMap::new(),
            lock_timeout: config.lock_timeout(),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Row handle for a unit about to lock it, created empty if absent
    pub(crate) fn row_for_update(&self, key: &WalletKey) -> Row<WalletRow> {
        let row = self.rows.entry(key.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(WalletRow {
                wallet: AssetWallet::empty(key.0, key.1.clone()),
                materialized: false,
            }))
        });
        Arc::clone(row.value())
    }

    /// Drop the row under `key` if no unit ever committed into it
    ///
    /// A row still referenced or locked by another unit is kept; that unit
    /// either materializes it or discards it when it aborts.
    pub(crate) fn discard_placeholder(&self, key: &WalletKey) {
        let removed = self.rows.remove_if(key, |_, row| {
            Arc::strong_count(row) == 1
                && row.try_lock().map(|guard| !guard.materialized).unwrap_or(false)
        });
        if removed.is_some() {
            tracing::trace!(owner = key.0, symbol = %key.1, "discarded placeholder wallet row");
        }
    }

    #[cfg(test)]
    pub(crate) fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Committed wallet of `owner` for `symbol`, if any
    pub fn wallet(
        &self,
        owner: OwnerId,
        symbol: &AssetSymbol,
    ) -> Result<Option<AssetWallet>, LedgerError> {
        let Some(row) = self
            .rows
            .get(&(owner, symbol.clone()))
            .map(|row| Arc::clone(row.value()))
        else {
            return Ok(None);
        };

        let guard = lock_row(&row, self.lock_timeout, "wallet read")?;
        Ok(guard.materialized.then(|| guard.wallet.clone()))
    }

    /// Committed wallets of one owner, sorted by symbol
    pub fn wallets_for(&self, owner: OwnerId) -> Result<Vec<AssetWallet>, LedgerError> {
        let rows: Vec<Row<WalletRow>> = self
            .rows
            .iter()
            .filter(|entry| entry.key().0 == owner)
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut wallets = self.materialized(&rows)?;
        wallets.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(wallets)
    }

    /// Every committed wallet, sorted by owner then symbol
    pub fn all(&self) -> Result<Vec<AssetWallet>, LedgerError> {
        let rows: Vec<Row<WalletRow>> = self
            .rows
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut wallets = self.materialized(&rows)?;
        wallets.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(wallets)
    }

    fn materialized(&self, rows: &[Row<WalletRow>]) -> Result<Vec<AssetWallet>, LedgerError> {
        let mut wallets = Vec::with_capacity(rows.len());
        for row in rows {
            let guard = lock_row(row, self.lock_timeout, "wallet listing")?;
            if guard.materialized {
                wallets.push(guard.wallet.clone());
            }
        }
        Ok(wallets)
    }
}

impl Default for AssetWalletStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}
