//! Queued risk scoring on a background task
//!
//! `QueuedRiskDispatcher` pushes committed log entries onto an unbounded
//! tokio channel and returns immediately. A `RiskWorker` task drains the
//! channel and scores each entry, retrying transient store errors with a
//! linear backoff. Scoring is idempotent per transaction id, so a retry
//! after a partial attempt is harmless.
//!
//! The worker stops once every dispatcher clone has been dropped and the
//! queue is empty, and reports what it did.

use crate::config::RiskWorkerConfig;
use crate::core::risk::RiskScorer;
use crate::core::traits::RiskDispatcher;
use crate::types::TransactionLogEntry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Dispatcher that queues entries for the background worker
#[derive(Debug, Clone)]
pub struct QueuedRiskDispatcher {
    sender: mpsc::UnboundedSender<TransactionLogEntry>,
}

impl RiskDispatcher for QueuedRiskDispatcher {
    fn dispatch(&self, entries: &[TransactionLogEntry]) {
        for entry in entries {
            if self.sender.send(entry.clone()).is_err() {
                tracing::warn!(tx = entry.id, "risk worker stopped, entry not scored");
            }
        }
    }
}

/// Totals of a finished worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskWorkerReport {
    pub scored: usize,
    pub failed: usize,
    pub retries: usize,
}

/// Background consumer of queued entries
pub struct RiskWorker {
    scorer: Arc<RiskScorer>,
    receiver: mpsc::UnboundedReceiver<TransactionLogEntry>,
    config: RiskWorkerConfig,
}

impl RiskWorker {
    /// Create a worker and the dispatcher that feeds it
    pub fn new(scorer: Arc<RiskScorer>, config: RiskWorkerConfig) -> (QueuedRiskDispatcher, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            QueuedRiskDispatcher { sender },
            RiskWorker {
                scorer,
                receiver,
                config,
            },
        )
    }

    /// Score queued entries until every dispatcher is gone
    pub async fn run(mut self) -> RiskWorkerReport {
        let mut report = RiskWorkerReport::default();

        while let Some(entry) = self.receiver.recv().await {
            self.score(&entry, &mut report).await;
        }

        tracing::debug!(
            scored = report.scored,
            failed = report.failed,
            retries = report.retries,
            "risk worker drained"
        );
        report
    }

    async fn score(&self, entry: &TransactionLogEntry, report: &mut RiskWorkerReport) {
        let mut attempt = 1;
        loop {
            match self.scorer.evaluate(entry) {
                Ok(_) => {
                    report.scored += 1;
                    return;
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    tracing::warn!(tx = entry.id, attempt, error = %e, "risk scoring retry");
                    report.retries += 1;
                    tokio::time::sleep(self.config.retry_backoff() * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(tx = entry.id, attempt, error = %e, "risk scoring failed");
                    report.failed += 1;
                    return;
                }
            }
        }
    }
}

/// Spawn a worker on the current runtime
pub fn spawn_risk_worker(
    scorer: Arc<RiskScorer>,
    config: RiskWorkerConfig,
) -> (QueuedRiskDispatcher, JoinHandle<RiskWorkerReport>) {
    let (dispatcher, worker) = RiskWorker::new(scorer, config);
    (dispatcher, tokio::spawn(worker.run()))
}
