//! Ledger property and scenario tests
//!
//! Drives the public engine API directly: conservation, atomicity, minimum
//! balances, average-price bookkeeping, holdings that never go negative, and
//! opposite-direction transfers racing on the same pair of rows.

use ledger_transfer_engine::config::LedgerConfig;
use ledger_transfer_engine::core::{
    AssetCatalog, AssetWalletStore, FixedPriceOracle, LedgerStore, NoopRiskDispatcher,
    TransferEngine,
};
use ledger_transfer_engine::types::{
    Account, AccountId, AccountNumber, AssetSymbol, AssetWallet, LedgerError, TransactionKind,
};
use rstest::rstest;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn number(id: AccountId) -> String {
    format!("ACC{:09}", id)
}

struct Fixture {
    engine: TransferEngine,
    prices: Arc<FixedPriceOracle>,
}

impl Fixture {
    /// Accounts given as (id, owner, balance, minimum)
    fn new(accounts: &[(AccountId, u32, &str, &str)]) -> Self {
        let config = LedgerConfig::default();
        let ledger = Arc::new(LedgerStore::new(&config.store));
        for &(id, owner, balance, minimum) in accounts {
            let account = Account::new(id, AccountNumber::parse(&number(id)).unwrap(), owner)
                .with_balance(d(balance))
                .with_minimum_balance(d(minimum));
            ledger.insert_account(account).unwrap();
        }

        let catalog = AssetCatalog::from_config(&config).unwrap();
        let prices = Arc::new(FixedPriceOracle::from_catalog(&catalog));
        let engine = TransferEngine::new(
            ledger,
            Arc::new(AssetWalletStore::new(&config.store)),
            catalog,
            prices.clone(),
            Arc::new(NoopRiskDispatcher),
        );
        Fixture { engine, prices }
    }

    fn balance(&self, id: AccountId) -> Decimal {
        self.engine.ledger().account(id).unwrap().balance
    }

    fn log_len(&self, id: AccountId) -> usize {
        self.engine.ledger().history(id, Some(500), 0).unwrap().len()
    }

    fn wallet(&self, owner: u32, symbol: &str) -> Option<AssetWallet> {
        let symbol = AssetSymbol::parse(symbol).unwrap();
        self.engine.wallets().wallet(owner, &symbol).unwrap()
    }
}

#[rstest]
#[case("0.01")]
#[case("199.99")]
#[case("500.00")]
fn transfer_conserves_money(#[case] amount: &str) {
    let fx = Fixture::new(&[(1, 1, "500.00", "0"), (2, 2, "300.00", "0")]);
    let amount = d(amount);

    fx.engine.transfer(1, &number(2), amount, None).unwrap();

    assert_eq!(d("500.00") - fx.balance(1), amount);
    assert_eq!(fx.balance(2) - d("300.00"), amount);
    assert!(fx.engine.ledger().verify_audit_trail(1).unwrap());
    assert!(fx.engine.ledger().verify_audit_trail(2).unwrap());
}

#[rstest]
#[case::unknown_number("ACC000000099")]
#[case::malformed_number("ACC-2")]
#[case::own_number("ACC000000001")]
fn failed_transfer_leaves_source_untouched(#[case] target: &str) {
    let fx = Fixture::new(&[(1, 1, "500.00", "0")]);

    assert!(fx.engine.transfer(1, target, d("100.00"), None).is_err());

    assert_eq!(fx.balance(1), d("500.00"));
    assert_eq!(fx.log_len(1), 0);
}

#[test]
fn transfer_below_minimum_fails_and_exact_minimum_succeeds() {
    let fx = Fixture::new(&[(1, 1, "500.00", "100.00"), (2, 2, "0", "0")]);

    let error = fx.engine.transfer(1, &number(2), d("400.01"), None).unwrap_err();
    assert!(matches!(error, LedgerError::InsufficientFunds { .. }));
    assert_eq!(fx.balance(1), d("500.00"));
    assert_eq!(fx.balance(2), d("0"));

    fx.engine.transfer(1, &number(2), d("400.00"), None).unwrap();
    assert_eq!(fx.balance(1), d("100.00"));
}

#[test]
fn withdraw_to_zero_then_one_cent_more() {
    let fx = Fixture::new(&[(1, 1, "1000.00", "0")]);

    let receipt = fx.engine.withdraw(1, d("1000.00"), None).unwrap();
    assert_eq!(receipt.new_balance.to_string(), "0.00");

    let error = fx.engine.withdraw(1, d("0.01"), None).unwrap_err();
    assert!(matches!(error, LedgerError::InsufficientFunds { .. }));
    assert_eq!(fx.log_len(1), 1);
}

#[test]
fn transfer_writes_both_legs() {
    let fx = Fixture::new(&[(1, 1, "500.00", "0"), (2, 2, "300.00", "0")]);

    let receipt = fx.engine.transfer(1, "ACC000000002", d("200.00"), None).unwrap();
    assert_eq!(receipt.new_source_balance.to_string(), "300.00");
    assert_eq!(fx.balance(2).to_string(), "500.00");

    let out = fx.engine.history(1, None, 0).unwrap();
    let incoming = fx.engine.history(2, None, 0).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(incoming.len(), 1);

    assert_eq!(out[0].kind, TransactionKind::TransferOut);
    assert_eq!(out[0].amount, d("-200.00"));
    assert_eq!(out[0].balance_after.to_string(), "300.00");
    assert_eq!(out[0].description, "Transfer to ACC000000002");

    assert_eq!(incoming[0].kind, TransactionKind::TransferIn);
    assert_eq!(incoming[0].amount, d("200.00"));
    assert_eq!(incoming[0].balance_after.to_string(), "500.00");
    assert_eq!(incoming[0].description, "Transfer from account");
}

#[test]
fn buying_btc_into_an_empty_wallet() {
    let fx = Fixture::new(&[(1, 7, "5000.00", "0")]);

    let receipt = fx.engine.crypto_buy(1, "BTC", d("1000.00")).unwrap();

    // 1000 / 45230 = 0.022109219..., truncated to 8 digits
    assert_eq!(receipt.crypto_amount.to_string(), "0.02210921");
    assert_eq!(receipt.new_account_balance.to_string(), "4000.00");

    let wallet = fx.wallet(7, "BTC").unwrap();
    assert_eq!(wallet.quantity, receipt.crypto_amount);
    assert_eq!(wallet.average_price, d("45230"));
}

#[test]
fn second_buy_weights_the_average_price() {
    let fx = Fixture::new(&[(1, 7, "10000.00", "0")]);

    let first = fx.engine.crypto_buy(1, "ETH", d("2890.00")).unwrap();
    fx.prices.set_price(AssetSymbol::parse("ETH").unwrap(), d("3000"));
    let second = fx.engine.crypto_buy(1, "ETH", d("1500.00")).unwrap();

    let (q1, p1) = (first.crypto_amount, d("2890"));
    let (q2, p2) = (second.crypto_amount, d("3000"));
    let expected = (q1 * p1 + q2 * p2) / (q1 + q2);

    let wallet = fx.wallet(7, "ETH").unwrap();
    assert_eq!(wallet.quantity, q1 + q2);
    assert!((wallet.average_price - expected).abs() < d("0.0001"));
}

#[rstest]
#[case("0.01")]
#[case("0.5")]
#[case("1")]
fn selling_keeps_the_average_price(#[case] quantity: &str) {
    let fx = Fixture::new(&[(1, 7, "5000.00", "0")]);
    fx.engine.crypto_buy(1, "ETH", d("2890.00")).unwrap();
    let before = fx.wallet(7, "ETH").unwrap();

    fx.engine.crypto_sell(1, "ETH", d(quantity)).unwrap();

    let after = fx.wallet(7, "ETH").unwrap();
    assert_eq!(after.average_price, before.average_price);
    assert_eq!(after.quantity, before.quantity - d(quantity));
}

#[test]
fn selling_more_than_held_fails_without_changes() {
    let fx = Fixture::new(&[(1, 7, "1000.00", "0")]);
    fx.engine.crypto_buy(1, "ETH", d("289.00")).unwrap();
    let before = fx.wallet(7, "ETH").unwrap();
    let balance = fx.balance(1);

    let error = fx.engine.crypto_sell(1, "ETH", d("0.10000001")).unwrap_err();
    assert!(matches!(error, LedgerError::InsufficientHoldings { .. }));

    assert_eq!(fx.wallet(7, "ETH").unwrap(), before);
    assert_eq!(fx.balance(1), balance);
}

#[test]
fn selling_an_asset_never_bought_fails() {
    let fx = Fixture::new(&[(1, 7, "1000.00", "0")]);

    let error = fx.engine.crypto_sell(1, "DOT", d("1")).unwrap_err();
    assert!(matches!(error, LedgerError::InsufficientHoldings { .. }));
    assert!(fx.wallet(7, "DOT").is_none());
    assert_eq!(fx.log_len(1), 0);
}

#[test]
fn opposite_transfers_race_without_deadlock() {
    const ROUNDS: usize = 200;
    let fx = Fixture::new(&[(1, 1, "1000.00", "0"), (2, 2, "1000.00", "0")]);
    let engine = &fx.engine;

    let committed: usize = thread::scope(|scope| {
        let forward = scope.spawn(|| {
            (0..ROUNDS)
                .filter(|_| engine.transfer(1, &number(2), d("3.00"), None).is_ok())
                .count()
        });
        let backward = scope.spawn(|| {
            (0..ROUNDS)
                .filter(|_| engine.transfer(2, &number(1), d("2.00"), None).is_ok())
                .count()
        });
        forward.join().unwrap() + backward.join().unwrap()
    });

    assert_eq!(fx.balance(1) + fx.balance(2), d("2000.00"));
    assert_eq!(fx.log_len(1) + fx.log_len(2), committed * 2);
    assert!(engine.ledger().verify_audit_trail(1).unwrap());
    assert!(engine.ledger().verify_audit_trail(2).unwrap());
}
