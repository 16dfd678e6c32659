//! Asynchronous CSV reader with batch interface
//!
//! Provides batched reading of operation records for the asynchronous
//! pipeline.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of OperationRecords
//!                  ↓
//!           csv_format module
//!           (OperationCsvRecord, convert_operation_record)
//! ```
//!
//! Rows that fail to parse or convert are logged with their line number and
//! skipped; they never reach the engine.

use crate::io::csv_format::{convert_operation_record, OperationCsvRecord};
use crate::types::{LedgerError, OperationRecord};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;

/// Asynchronous operation reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: u64,
    rejected: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 1,
            rejected: 0,
        }
    }

    /// Read up to `batch_size` valid operation records
    ///
    /// Returns an empty vector once the end of the input is reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<OperationRecord> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<OperationCsvRecord>();

        while batch.len() < batch_size {
            let Some(row) = records.next().await else {
                break;
            };
            self.line_num += 1;

            let converted = row
                .map_err(|e| LedgerError::parse_error(Some(self.line_num), &e.to_string()))
                .and_then(convert_operation_record);

            match converted {
                Ok(record) => batch.push(record),
                Err(e) => {
                    self.rejected += 1;
                    tracing::warn!(line = self.line_num, error = %e, "skipping operation record");
                }
            }
        }

        batch
    }

    /// Rows skipped so far because they could not be parsed
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}
