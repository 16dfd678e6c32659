//! Synchronous processing strategy
//!
//! Single-threaded replay. Records stream one at a time from `SyncReader`
//! into the `TransferEngine`, and every committed entry is scored inline
//! before the next record is read.
//!
//! # Memory Efficiency
//!
//! The operation file is never loaded whole; memory grows with the ledger
//! (accounts, log, wallets), not with the input.

use crate::config::LedgerConfig;
use crate::core::InlineRiskDispatcher;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{ProcessingStrategy, ProcessingSummary, SeededLedger};
use crate::types::LedgerError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use ledger_transfer_engine::config::LedgerConfig;
/// use ledger_transfer_engine::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
///
/// let strategy = SyncProcessingStrategy::new(LedgerConfig::default());
/// let mut output = std::io::stdout();
///
/// strategy
///     .process(Path::new("accounts.csv"), Path::new("operations.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone)]
pub struct SyncProcessingStrategy {
    config: LedgerConfig,
}

impl SyncProcessingStrategy {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(
        &self,
        accounts_path: &Path,
        operations_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ProcessingSummary, LedgerError> {
        let seeded = SeededLedger::seed(&self.config, accounts_path)?;
        let engine = seeded.engine(Arc::new(InlineRiskDispatcher::new(Arc::clone(
            &seeded.scorer,
        ))));

        let mut reader = SyncReader::new(operations_path)?;
        let mut summary = ProcessingSummary::default();

        while let Some(result) = reader.next() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    summary.malformed += 1;
                    tracing::warn!(line = reader.line(), error = %e, "skipping operation record");
                    continue;
                }
            };

            match engine.process(&record) {
                Ok(_) => summary.applied += 1,
                Err(e) => {
                    summary.rejected += 1;
                    tracing::warn!(
                        line = reader.line(),
                        account = record.account,
                        error = %e,
                        "operation rejected"
                    );
                }
            }
        }

        seeded.finish(summary, output)
    }
}
