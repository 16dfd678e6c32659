//! Transfer engine
//!
//! This module provides the `TransferEngine` that turns operation requests
//! into atomic units against the ledger and wallet stores.
//!
//! The engine enforces business rules such as:
//! - Amount validation (positive, fiat precision, minimum trade size)
//! - Same-account and unknown-destination rejection for transfers
//! - Asset resolution and quantity truncation for crypto conversions
//!
//! Every operation is exactly one atomic unit. Once it commits, its log
//! entries are handed to the risk dispatcher; the engine never waits on or
//! reacts to the scoring outcome.

use crate::core::atomic_unit::{execute, AtomicUnit, Committed, UnitScope};
use crate::core::ledger_store::LedgerStore;
use crate::core::pricing::AssetCatalog;
use crate::core::traits::{PriceOracle, RiskDispatcher};
use crate::core::wallet_store::AssetWalletStore;
use crate::types::money::{asset_amount, fiat_amount, to_fiat, truncate_to};
use crate::types::{
    AccountId, AccountNumber, CryptoTradeReceipt, HoldingValuation, LedgerError,
    MovementReceipt, OperationOutcome, OperationRecord, OperationType, OwnerId, TradeDirection,
    TransactionKind, TransactionLogEntry, TransferReceipt,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Longest description accepted, in characters
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// Orchestrates deposits, withdrawals, transfers and crypto conversions
pub struct TransferEngine {
    ledger: Arc<LedgerStore>,
    wallets: Arc<AssetWalletStore>,
    catalog: AssetCatalog,
    prices: Arc<dyn PriceOracle>,
    risk: Arc<dyn RiskDispatcher>,
}

impl TransferEngine {
    pub fn new(
        ledger: Arc<LedgerStore>,
        wallets: Arc<AssetWalletStore>,
        catalog: AssetCatalog,
        prices: Arc<dyn PriceOracle>,
        risk: Arc<dyn RiskDispatcher>,
    ) -> Self {
        TransferEngine {
            ledger,
            wallets,
            catalog,
            prices,
            risk,
        }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn wallets(&self) -> &AssetWalletStore {
        &self.wallets
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    /// Process a single operation record
    ///
    /// Routes the record to the matching operation. Transfers need `target`,
    /// buys and sells need `asset`.
    pub fn process(&self, record: &OperationRecord) -> Result<OperationOutcome, LedgerError> {
        let description = record.description.as_deref();

        match record.op {
            OperationType::Deposit => self
                .deposit(record.account, record.amount, description)
                .map(OperationOutcome::Movement),
            OperationType::Withdraw => self
                .withdraw(record.account, record.amount, description)
                .map(OperationOutcome::Movement),
            OperationType::Transfer => {
                let target = record
                    .target
                    .as_deref()
                    .ok_or_else(|| LedgerError::missing_field("transfer", record.account, "target"))?;
                self.transfer(record.account, target, record.amount, description)
                    .map(OperationOutcome::Transfer)
            }
            OperationType::Buy | OperationType::Sell => {
                let op = if record.op == OperationType::Buy { "buy" } else { "sell" };
                let direction = if record.op == OperationType::Buy {
                    TradeDirection::Buy
                } else {
                    TradeDirection::Sell
                };
                let asset = record
                    .asset
                    .as_deref()
                    .ok_or_else(|| LedgerError::missing_field(op, record.account, "asset"))?;
                self.crypto_convert(record.account, asset, direction, record.amount)
                    .map(OperationOutcome::Trade)
            }
        }
    }

    /// Credit `amount` to an active account
    pub fn deposit(
        &self,
        account: AccountId,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<MovementReceipt, LedgerError> {
        let amount = fiat_amount(amount)?;
        let description = describe(description, "Deposit")?;

        let committed = self.run(UnitScope::accounts(&[account]), "deposit", |unit| {
            unit.apply_delta(account, amount, TransactionKind::Deposit, &description)
        })?;

        tracing::debug!(account, %amount, tx = committed.id, "deposit");
        Ok(MovementReceipt {
            transaction_id: committed.id,
            new_balance: committed.balance_after,
        })
    }

    /// Debit `amount` from an active account, respecting its minimum balance
    pub fn withdraw(
        &self,
        account: AccountId,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<MovementReceipt, LedgerError> {
        let amount = fiat_amount(amount)?;
        let description = describe(description, "Withdrawal")?;

        let committed = self.run(UnitScope::accounts(&[account]), "withdraw", |unit| {
            unit.apply_delta(account, -amount, TransactionKind::Withdraw, &description)
        })?;

        tracing::debug!(account, %amount, tx = committed.id, "withdraw");
        Ok(MovementReceipt {
            transaction_id: committed.id,
            new_balance: committed.balance_after,
        })
    }

    /// Move `amount` from `from` to the account numbered `to_number`
    ///
    /// Both legs commit together or not at all. The source's minimum-balance
    /// check runs first; an unknown destination is only reported after it,
    /// and aborts the debit with it.
    pub fn transfer(
        &self,
        from: AccountId,
        to_number: &str,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<TransferReceipt, LedgerError> {
        let amount = fiat_amount(amount)?;
        let description = describe(description, "Transfer")?;
        let destination = AccountNumber::parse(to_number)?;
        let to = self.ledger.resolve_number(&destination);

        if to == Some(from) {
            return Err(LedgerError::same_account(from));
        }

        let ids: Vec<AccountId> = std::iter::once(from).chain(to).collect();
        let receipt = self.run(UnitScope::accounts(&ids), "transfer", |unit| {
            let out = unit.apply_delta(
                from,
                -amount,
                TransactionKind::TransferOut,
                &format!("{} to {}", description, destination),
            )?;

            let to = to.ok_or_else(|| LedgerError::account_number_not_found(destination.as_str()))?;
            let inbound = unit.apply_delta(
                to,
                amount,
                TransactionKind::TransferIn,
                &format!("{} from account", description),
            )?;

            Ok(TransferReceipt {
                out_transaction_id: out.id,
                in_transaction_id: inbound.id,
                new_source_balance: out.balance_after,
                destination: destination.clone(),
            })
        })?;

        tracing::debug!(from, to = %receipt.destination, %amount, "transfer");
        Ok(receipt)
    }

    /// Buy or sell an asset against the account's fiat balance
    ///
    /// For a buy `amount` is fiat; for a sell it is an asset quantity.
    pub fn crypto_convert(
        &self,
        account: AccountId,
        symbol: &str,
        direction: TradeDirection,
        amount: Decimal,
    ) -> Result<CryptoTradeReceipt, LedgerError> {
        match direction {
            TradeDirection::Buy => self.crypto_buy(account, symbol, amount),
            TradeDirection::Sell => self.crypto_sell(account, symbol, amount),
        }
    }

    /// Spend `usd_amount` on `symbol` at the current price
    pub fn crypto_buy(
        &self,
        account: AccountId,
        symbol: &str,
        usd_amount: Decimal,
    ) -> Result<CryptoTradeReceipt, LedgerError> {
        let (symbol, spec) = self.catalog.resolve(symbol)?;
        let usd = fiat_amount(usd_amount)?;
        if usd < spec.min_trade_usd {
            return Err(LedgerError::invalid_amount(
                usd,
                &format!("minimum purchase is {} USD", spec.min_trade_usd),
            ));
        }

        let price = self.prices.price(&symbol)?;
        let quantity = usd
            .checked_div(price)
            .map(|q| truncate_to(q, spec.precision))
            .ok_or_else(|| LedgerError::arithmetic_overflow("crypto_purchase", account))?;
        if quantity.is_zero() || quantity < spec.min_quantity {
            return Err(LedgerError::invalid_amount(
                quantity,
                &format!("purchase yields less than the minimum of {} {}", spec.min_quantity, symbol),
            ));
        }

        let owner = self.active_owner(account)?;
        let scope = UnitScope::accounts(&[account]).with_wallet((owner, symbol.clone()));
        let description = format!("Crypto purchase: {} {}", quantity, symbol);

        let receipt = self.run(scope, "crypto_buy", |unit| {
            let entry =
                unit.apply_delta(account, -usd, TransactionKind::CryptoPurchase, &description)?;
            let wallet = unit.credit_holding(quantity, usd, price)?;

            Ok(CryptoTradeReceipt {
                transaction_id: entry.id,
                symbol: symbol.clone(),
                direction: TradeDirection::Buy,
                crypto_amount: quantity,
                usd_amount: usd,
                price_per_unit: price,
                new_account_balance: entry.balance_after,
                holding_after: wallet.quantity,
            })
        })?;

        tracing::debug!(account, %symbol, %quantity, %usd, "crypto buy");
        Ok(receipt)
    }

    /// Sell `quantity` of `symbol` at the current price
    pub fn crypto_sell(
        &self,
        account: AccountId,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<CryptoTradeReceipt, LedgerError> {
        let (symbol, spec) = self.catalog.resolve(symbol)?;
        let quantity = asset_amount(quantity, spec.precision)?;
        let price = self.prices.price(&symbol)?;

        let usd = quantity
            .checked_mul(price)
            .map(to_fiat)
            .ok_or_else(|| LedgerError::arithmetic_overflow("crypto_sale", account))?;
        if usd <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(
                quantity,
                "sale proceeds round to zero",
            ));
        }

        let owner = self.active_owner(account)?;
        let scope = UnitScope::accounts(&[account]).with_wallet((owner, symbol.clone()));
        let description = format!("Crypto sale: {} {}", quantity, symbol);

        let receipt = self.run(scope, "crypto_sell", |unit| {
            let holding_after = unit.debit_holding(quantity)?.quantity;
            let entry = unit.apply_delta(account, usd, TransactionKind::CryptoSale, &description)?;

            Ok(CryptoTradeReceipt {
                transaction_id: entry.id,
                symbol: symbol.clone(),
                direction: TradeDirection::Sell,
                crypto_amount: quantity,
                usd_amount: usd,
                price_per_unit: price,
                new_account_balance: entry.balance_after,
                holding_after,
            })
        })?;

        tracing::debug!(account, %symbol, %quantity, %usd, "crypto sell");
        Ok(receipt)
    }

    /// Page of an account's transaction log, newest first
    pub fn history(
        &self,
        account: AccountId,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<TransactionLogEntry>, LedgerError> {
        self.ledger.history(account, limit, offset)
    }

    /// Current valuation of every asset `owner` holds
    pub fn portfolio(&self, owner: OwnerId) -> Result<Vec<HoldingValuation>, LedgerError> {
        self.wallets
            .wallets_for(owner)?
            .into_iter()
            .filter(|wallet| wallet.quantity > Decimal::ZERO)
            .map(|wallet| {
                let current_price = self.prices.price(&wallet.symbol)?;
                let overflow = || LedgerError::arithmetic_overflow("portfolio valuation", owner);
                let current_value = wallet
                    .quantity
                    .checked_mul(current_price)
                    .map(to_fiat)
                    .ok_or_else(overflow)?;
                let profit_loss = current_price
                    .checked_sub(wallet.average_price)
                    .and_then(|gain| gain.checked_mul(wallet.quantity))
                    .map(to_fiat)
                    .ok_or_else(overflow)?;

                Ok(HoldingValuation {
                    symbol: wallet.symbol,
                    quantity: wallet.quantity,
                    average_price: wallet.average_price,
                    current_price,
                    current_value,
                    profit_loss,
                })
            })
            .collect()
    }

    /// Owner of an account that may take part in a trade
    fn active_owner(&self, account: AccountId) -> Result<OwnerId, LedgerError> {
        let account = self.ledger.account(account)?;
        if !account.is_active() {
            return Err(LedgerError::account_not_found(account.id));
        }
        Ok(account.owner)
    }

    /// Execute one unit and hand its entries to the risk dispatcher
    fn run<R, F>(&self, scope: UnitScope, operation: &str, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&mut AtomicUnit<'_>) -> Result<R, LedgerError>,
    {
        let Committed { value, entries } = execute(&self.ledger, &self.wallets, scope, operation, f)?;
        self.risk.dispatch(&entries);
        Ok(value)
    }
}

/// Trimmed description, or `default` when absent or blank
fn describe(description: Option<&str>, default: &str) -> Result<String, LedgerError> {
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        None => Ok(default.to_string()),
        Some(d) => {
            let length = d.chars().count();
            if length > MAX_DESCRIPTION_LEN {
                return Err(LedgerError::DescriptionTooLong {
                    length,
                    max: MAX_DESCRIPTION_LEN,
                });
            }
            Ok(d.to_string())
        }
    }
}
