//! Ledger transfer engine CLI
//!
//! Replays an operation CSV against a seeded account table and prints the
//! final account state to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --accounts accounts.csv operations.csv > final.csv
//! cargo run -- --accounts accounts.csv --strategy sync operations.csv > final.csv
//! cargo run -- --accounts accounts.csv --config ledger.toml --wallets-out wallets.csv operations.csv
//! RUST_LOG=ledger_transfer_engine=debug cargo run -- --accounts accounts.csv operations.csv
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `warn`) so stdout stays CSV.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (bad configuration, unreadable files, malformed seed table, etc.)

use ledger_transfer_engine::cli;
use ledger_transfer_engine::io::write_wallets_csv;
use ledger_transfer_engine::strategy;
use ledger_transfer_engine::types::LedgerError;
use std::fs::File;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "cannot load configuration");
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let batch = matches!(args.strategy, cli::StrategyType::Async).then(|| args.to_batch_config());
    let strategy = strategy::create_strategy(args.strategy, config, batch);

    let mut output = std::io::stdout();
    let summary = match strategy.process(&args.accounts_file, &args.operations_file, &mut output) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    for alert in &summary.alerts {
        tracing::warn!(
            tx = alert.transaction_id,
            account = alert.account_id,
            score = alert.score,
            tier = ?alert.tier,
            "risk alert"
        );
    }

    if let Some(path) = &args.wallets_out {
        let written = File::create(path)
            .map_err(LedgerError::from)
            .and_then(|mut file| write_wallets_csv(&summary.wallets, &mut file));
        if let Err(e) = written {
            eprintln!("Error: cannot write wallets to '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}
