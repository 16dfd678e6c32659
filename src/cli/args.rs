use crate::config::{ConfigError, LedgerConfig};
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay ledger operations against a seeded account table
#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(about = "Replay ledger operations against a seeded account table", long_about = None)]
pub struct CliArgs {
    /// Operation CSV file (op,account,target,asset,amount,description)
    #[arg(value_name = "OPERATIONS", help = "Path to the operation CSV file")]
    pub operations_file: PathBuf,

    /// Seed account table (id,number,owner,balance,minimum_balance,status)
    #[arg(long = "accounts", value_name = "FILE", help = "Path to the seed account CSV file")]
    pub accounts_file: PathBuf,

    /// TOML configuration; built-in defaults when omitted
    #[arg(long = "config", value_name = "FILE", help = "Path to a TOML configuration file")]
    pub config_file: Option<PathBuf>,

    /// Processing strategy to use for the replay
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for synchronous or 'async' for asynchronous"
    )]
    pub strategy: StrategyType,

    /// Number of operations per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of operations per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Worker threads for batch processing (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Also write the final wallet table here
    #[arg(long = "wallets-out", value_name = "FILE", help = "Write final asset wallets to this CSV file")]
    pub wallets_out: Option<PathBuf>,
}

/// Available processing strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments, falling back to defaults
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Load the configuration file, or the defaults when none was given
    pub fn load_config(&self) -> Result<LedgerConfig, ConfigError> {
        match &self.config_file {
            Some(path) => LedgerConfig::load_file(path),
            None => Ok(LedgerConfig::default()),
        }
    }
}
