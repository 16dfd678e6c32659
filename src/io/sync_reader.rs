//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over operation records from a CSV file,
//! and a loader for the seed account table. Delegates CSV format concerns to
//! the csv_format module.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `Result<OperationRecord, LedgerError>` for each CSV row:
//!
//! ```no_run
//! use ledger_transfer_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let mut reader = SyncReader::new(Path::new("operations.csv")).unwrap();
//! while let Some(result) = reader.next() {
//!     match result {
//!         Ok(record) => println!("Processing operation: {:?}", record),
//!         Err(e) => eprintln!("Line {}: {}", reader.line(), e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual record errors are yielded as Err variants in the iterator;
//!   `line()` reports the line of the last record read
//!
//! # Memory Efficiency
//!
//! Records are read one at a time; the file is never loaded whole.

use crate::io::csv_format::{
    convert_account_record, convert_operation_record, AccountCsvRecord, OperationCsvRecord,
};
use crate::types::{Account, LedgerError, OperationRecord};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

fn open_csv(path: &Path) -> Result<csv::Reader<File>, LedgerError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LedgerError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => LedgerError::IoError {
            message: format!("Failed to open file '{}': {}", path.display(), e),
        },
    })?;

    Ok(ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .buffer_capacity(8 * 1024)
        .from_reader(file))
}

/// Synchronous operation reader
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl SyncReader {
    /// Open an operation CSV for streaming iteration
    ///
    /// The reader trims whitespace from all fields and accepts rows with
    /// trailing optional columns left out.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        Ok(Self {
            reader: open_csv(path)?,
            line_num: 1,
        })
    }

    /// Line of the last record returned, counting the header as line 1
    pub fn line(&self) -> u64 {
        self.line_num
    }
}

impl Iterator for SyncReader {
    type Item = Result<OperationRecord, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<OperationCsvRecord>();
        let next = deserializer.next()?;
        self.line_num += 1;

        Some(next.map_err(LedgerError::from).and_then(convert_operation_record))
    }
}

/// Load the seed account table
///
/// Unlike operation streams, a malformed seed row is fatal: the error names
/// the offending line.
pub fn read_accounts(path: &Path) -> Result<Vec<Account>, LedgerError> {
    let mut reader = open_csv(path)?;
    let mut accounts = Vec::new();

    for (index, row) in reader.deserialize::<AccountCsvRecord>().enumerate() {
        let line = index as u64 + 2;
        let account = row
            .map_err(LedgerError::from)
            .and_then(convert_account_record)
            .map_err(|e| match e {
                LedgerError::ParseError { .. } => e,
                other => LedgerError::parse_error(Some(line), &other.to_string()),
            })?;
        accounts.push(account);
    }

    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountStatus, OperationType};
    use rust_decimal::Decimal;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_sync_reader_fails_on_missing_file() {
        let result = SyncReader::new(Path::new("nonexistent.csv"));
        assert!(matches!(result, Err(LedgerError::FileNotFound { .. })));
    }

    #[test]
    fn test_sync_reader_iterates_operations() {
        let file = create_temp_csv(
            "op,account,target,asset,amount,description\n\
             deposit,1,,,100.00,Salary\n\
             transfer,1,ACC000000002,,25.00,\n\
             buy,1,,ETH,50,\n",
        );

        let records: Vec<_> = SyncReader::new(file.path()).unwrap().collect();
        assert_eq!(records.len(), 3);

        let deposit = records[0].as_ref().unwrap();
        assert_eq!(deposit.op, OperationType::Deposit);
        assert_eq!(deposit.amount, Decimal::new(10000, 2));
        assert_eq!(deposit.description.as_deref(), Some("Salary"));

        let transfer = records[1].as_ref().unwrap();
        assert_eq!(transfer.target.as_deref(), Some("ACC000000002"));
        assert_eq!(transfer.description, None);

        assert_eq!(records[2].as_ref().unwrap().asset.as_deref(), Some("ETH"));
    }

    #[test]
    fn test_sync_reader_accepts_short_rows() {
        let file = create_temp_csv("op,account,target,asset,amount,description\ndeposit,1,,,5\n");
        let records: Vec<_> = SyncReader::new(file.path()).unwrap().collect();
        assert!(records[0].is_ok());
    }

    #[test]
    fn test_sync_reader_continues_after_bad_rows() {
        let file = create_temp_csv(
            "op,account,target,asset,amount,description\n\
             refund,1,,,5,\n\
             deposit,not_a_number,,,5,\n\
             deposit,2,,,5,\n",
        );

        let mut reader = SyncReader::new(file.path()).unwrap();

        assert!(matches!(
            reader.next(),
            Some(Err(LedgerError::InvalidOperationType { .. }))
        ));
        assert_eq!(reader.line(), 2);
        assert!(matches!(reader.next(), Some(Err(LedgerError::ParseError { .. }))));
        assert_eq!(reader.line(), 3);
        assert_eq!(reader.next().unwrap().unwrap().account, 2);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_read_accounts() {
        let file = create_temp_csv(
            "id,number,owner,balance,minimum_balance,status\n\
             1,ACC000000001,10,500.00,100.00,active\n\
             2,ACC000000002,20,0,,frozen\n",
        );

        let accounts = read_accounts(file.path()).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].minimum_balance, Decimal::new(10000, 2));
        assert_eq!(accounts[1].status, AccountStatus::Frozen);
    }

    #[test]
    fn test_read_accounts_reports_bad_line() {
        let file = create_temp_csv(
            "id,number,owner,balance,minimum_balance,status\n\
             1,ACC000000001,10,500.00,,\n\
             2,BAD,20,0,,\n",
        );

        let error = read_accounts(file.path()).unwrap_err();
        assert!(matches!(error, LedgerError::ParseError { line: Some(3), .. }));
    }
}
