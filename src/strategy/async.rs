//! Asynchronous batch processing strategy
//!
//! Multi-threaded replay. Operations are read in batches; each batch is
//! partitioned into connected groups that run on separate tokio tasks, and
//! committed entries are scored by a background risk worker.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (connected-group partitioning)
//!     │   └── TransferEngine
//!     │       ├── LedgerStore / AssetWalletStore (row-locked state)
//!     │       └── QueuedRiskDispatcher
//!     └── RiskWorker (background scoring, drained before output)
//! ```
//!
//! Batches run one after another, so an account whose operations span
//! several batches still sees them in file order.

use crate::config::LedgerConfig;
use crate::core::r#async::{spawn_risk_worker, BatchProcessor};
use crate::io::async_reader::AsyncReader;
use crate::strategy::{ProcessingStrategy, ProcessingSummary, SeededLedger};
use crate::types::LedgerError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::compat::TokioAsyncReadCompatExt;

/// Configuration for batch processing
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of operations per batch
    pub batch_size: usize,
    /// Worker threads of the replay runtime
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig, replacing zero values with the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            tracing::warn!(
                default = default.batch_size,
                "invalid batch_size 0, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            tracing::warn!(
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches 0, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: LedgerConfig,
    batch: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: LedgerConfig, batch: BatchConfig) -> Self {
        Self { config, batch }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(
        &self,
        accounts_path: &Path,
        operations_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ProcessingSummary, LedgerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.batch.max_concurrent_batches)
            .enable_time()
            .build()
            .map_err(|e| LedgerError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let seeded = SeededLedger::seed(&self.config, accounts_path)?;
            let (dispatcher, worker) = spawn_risk_worker(
                Arc::clone(&seeded.scorer),
                self.config.risk_worker.clone(),
            );
            let processor = BatchProcessor::new(Arc::new(seeded.engine(Arc::new(dispatcher))));

            let file = tokio::fs::File::open(operations_path)
                .await
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => LedgerError::FileNotFound {
                        path: operations_path.display().to_string(),
                    },
                    _ => LedgerError::IoError {
                        message: format!(
                            "Failed to open file '{}': {}",
                            operations_path.display(),
                            e
                        ),
                    },
                })?;
            let mut reader = AsyncReader::new(file.compat());
            let mut summary = ProcessingSummary::default();

            loop {
                let batch = reader.read_batch(self.batch.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                for processed in processor.process_batch(batch).await {
                    match processed.result {
                        Ok(_) => summary.applied += 1,
                        Err(e) => {
                            summary.rejected += 1;
                            tracing::warn!(
                                account = processed.record.account,
                                op = ?processed.record.op,
                                error = %e,
                                "operation rejected"
                            );
                        }
                    }
                }
            }
            summary.malformed = reader.rejected();

            // Closing the last dispatcher lets the worker drain and stop
            drop(processor);
            match worker.await {
                Ok(report) => tracing::debug!(
                    scored = report.scored,
                    failed = report.failed,
                    retries = report.retries,
                    "risk worker finished"
                ),
                Err(e) => tracing::error!(error = %e, "risk worker task failed"),
            }

            seeded.finish(summary, output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SyncProcessingStrategy;
    use crate::types::AccountStatus;
    use tempfile::NamedTempFile;

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    const ACCOUNTS: &str = "id,number,owner,balance,minimum_balance,status\n\
                            1,ACC000000001,10,1000.00,0,active\n\
                            2,ACC000000002,10,500.00,0,active\n\
                            3,ACC000000003,30,200.00,0,active\n\
                            4,ACC000000004,40,0,0,active\n";

    fn strategy(batch_size: usize) -> AsyncProcessingStrategy {
        AsyncProcessingStrategy::new(LedgerConfig::default(), BatchConfig::new(batch_size, 2))
    }

    #[test]
    fn test_batch_config_replaces_zero_values() {
        let config = BatchConfig::new(0, 0);
        assert_eq!(config.batch_size, 1000);
        assert!(config.max_concurrent_batches > 0);

        let config = BatchConfig::new(10, 3);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_concurrent_batches, 3);
    }

    #[test]
    fn test_async_strategy_replays_operations() {
        let accounts = create_temp_csv(ACCOUNTS);
        let operations = create_temp_csv(
            "op,account,target,asset,amount,description\n\
             deposit,4,,,10.00,\n\
             transfer,3,ACC000000004,,50.00,\n\
             withdraw,1,,,100.00,\n",
        );

        let mut output = Vec::new();
        let summary = strategy(2)
            .process(accounts.path(), operations.path(), &mut output)
            .unwrap();

        assert_eq!(summary.applied, 3);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id,number,owner,balance,minimum_balance,status\n\
             1,ACC000000001,10,900.00,0.00,active\n\
             2,ACC000000002,10,500.00,0.00,active\n\
             3,ACC000000003,30,150.00,0.00,active\n\
             4,ACC000000004,40,60.00,0.00,active\n"
        );
    }

    #[test]
    fn test_async_strategy_handles_missing_file() {
        let accounts = create_temp_csv(ACCOUNTS);
        let result = strategy(10).process(accounts.path(), Path::new("nonexistent.csv"), &mut Vec::new());
        assert!(matches!(result, Err(LedgerError::FileNotFound { .. })));
    }

    #[test]
    fn test_async_strategy_maintains_ordering_across_batches() {
        // The withdrawal only succeeds after the two deposits in earlier batches
        let accounts = create_temp_csv(ACCOUNTS);
        let operations = create_temp_csv(
            "op,account,target,asset,amount,description\n\
             deposit,4,,,30.00,\n\
             deposit,4,,,30.00,\n\
             withdraw,4,,,60.00,\n",
        );

        let mut output = Vec::new();
        let summary = strategy(1)
            .process(accounts.path(), operations.path(), &mut output)
            .unwrap();

        assert_eq!(summary.rejected, 0);
        assert!(String::from_utf8(output)
            .unwrap()
            .contains("4,ACC000000004,40,0.00,0.00,active"));
    }

    #[test]
    fn test_async_strategy_matches_sync_strategy() {
        let accounts = create_temp_csv(ACCOUNTS);
        let operations = create_temp_csv(
            "op,account,target,asset,amount,description\n\
             buy,1,,BTC,452.30,\n\
             transfer,2,ACC000000003,,125.00,\n\
             sell,2,,BTC,0.005,\n\
             withdraw,4,,,1.00,\n\
             transfer,3,ACC000000004,,300.00,\n\
             buy,3,,DOT,25,\n\
             deposit,9,,,5.00,\n",
        );

        let mut sync_output = Vec::new();
        let sync_summary = SyncProcessingStrategy::new(LedgerConfig::default())
            .process(accounts.path(), operations.path(), &mut sync_output)
            .unwrap();

        let mut async_output = Vec::new();
        let async_summary = strategy(3)
            .process(accounts.path(), operations.path(), &mut async_output)
            .unwrap();

        assert_eq!(sync_output, async_output);
        assert_eq!(sync_summary.wallets, async_summary.wallets);
        assert_eq!(sync_summary.applied, async_summary.applied);
        assert_eq!(sync_summary.rejected, async_summary.rejected);
    }

    #[test]
    fn test_async_strategy_freezes_after_worker_drains() {
        let accounts = create_temp_csv(ACCOUNTS);
        let operations = create_temp_csv(
            "op,account,target,asset,amount,description\n\
             deposit,4,,,20000.00,\n",
        );
        let mut config = LedgerConfig::default();
        config.risk.medium_score = 10;
        config.risk.high_score = 30;
        config.risk.freeze_score = 30;

        let mut output = Vec::new();
        let summary = AsyncProcessingStrategy::new(config, BatchConfig::new(10, 2))
            .process(accounts.path(), operations.path(), &mut output)
            .unwrap();

        assert_eq!(summary.alerts.len(), 1);
        assert!(String::from_utf8(output)
            .unwrap()
            .contains(&format!("4,ACC000000004,40,20000.00,0.00,{}", AccountStatus::Frozen)));
    }
}
