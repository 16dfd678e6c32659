//! Processing strategy module for operation replay
//!
//! This module defines the Strategy pattern for complete replay pipelines:
//! seed a ledger from an account table, run an operation CSV through the
//! transfer engine and print the final account state. Synchronous and
//! asynchronous batch implementations can be selected at runtime and reach
//! the same final state for the same input.

use crate::cli::StrategyType;
use crate::config::LedgerConfig;
use crate::core::{
    AssetCatalog, AssetWalletStore, FixedPriceOracle, LedgerStore, RiskDispatcher, RiskScorer,
    RiskSignalStore, TransferEngine,
};
use crate::io::csv_format::write_accounts_csv;
use crate::io::sync_reader::read_accounts;
use crate::types::{AssetWallet, LedgerError, RiskSignal};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// What a replay did, beyond the printed account table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingSummary {
    /// Operations the engine committed
    pub applied: usize,
    /// Operations the engine refused
    pub rejected: usize,
    /// Rows that never reached the engine
    pub malformed: usize,
    /// MEDIUM and HIGH risk signals, newest first
    pub alerts: Vec<RiskSignal>,
    /// Final wallet state, sorted by owner and symbol
    pub wallets: Vec<AssetWallet>,
}

/// Processing strategy trait for complete replay pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Seed accounts from `accounts_path`, replay `operations_path` and write
    /// the final account table to `output`
    ///
    /// Fatal errors (unreadable files, a malformed seed table, output
    /// failures) abort the replay. Individual operation errors are logged
    /// with `tracing` and counted in the summary; processing continues with
    /// the next record.
    fn process(
        &self,
        accounts_path: &Path,
        operations_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ProcessingSummary, LedgerError>;
}

/// Create a processing strategy based on the specified strategy type
///
/// `batch` is ignored by the synchronous strategy.
pub fn create_strategy(
    strategy_type: StrategyType,
    config: LedgerConfig,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(config)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            config,
            batch.unwrap_or_default(),
        )),
    }
}

/// Stores and services shared by both pipelines
pub(crate) struct SeededLedger {
    pub ledger: Arc<LedgerStore>,
    pub wallets: Arc<AssetWalletStore>,
    pub catalog: AssetCatalog,
    pub prices: Arc<FixedPriceOracle>,
    pub scorer: Arc<RiskScorer>,
}

impl SeededLedger {
    pub fn seed(config: &LedgerConfig, accounts_path: &Path) -> Result<Self, LedgerError> {
        let ledger = Arc::new(LedgerStore::new(&config.store));
        for account in read_accounts(accounts_path)? {
            ledger.insert_account(account)?;
        }

        let catalog = AssetCatalog::from_config(config)?;
        let prices = Arc::new(FixedPriceOracle::from_catalog(&catalog));
        let scorer = Arc::new(RiskScorer::new(
            config.risk.clone(),
            Arc::clone(&ledger),
            Arc::new(RiskSignalStore::new()),
        ));

        Ok(Self {
            ledger,
            wallets: Arc::new(AssetWalletStore::new(&config.store)),
            catalog,
            prices,
            scorer,
        })
    }

    pub fn engine(&self, risk: Arc<dyn RiskDispatcher>) -> TransferEngine {
        TransferEngine::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.wallets),
            self.catalog.clone(),
            self.prices.clone(),
            risk,
        )
    }

    /// Write the account table and collect the rest of the final state
    pub fn finish(
        &self,
        mut summary: ProcessingSummary,
        output: &mut dyn Write,
    ) -> Result<ProcessingSummary, LedgerError> {
        write_accounts_csv(&self.ledger.accounts()?, output)?;

        summary.alerts = self.scorer.alerts(None);
        summary.wallets = self.wallets.all()?;

        tracing::info!(
            applied = summary.applied,
            rejected = summary.rejected,
            malformed = summary.malformed,
            alerts = summary.alerts.len(),
            "replay finished"
        );
        Ok(summary)
    }
}
