//! Batch processing with connected-group partitioning
//!
//! This module provides the `BatchProcessor` struct, which runs batches of
//! operation records concurrently without changing their outcome.
//!
//! # Design
//!
//! Two operations may only run in parallel if they cannot touch a common
//! row. The processor therefore partitions each batch into connected groups:
//!
//! - every operation belongs to its account's node
//! - a transfer links its source and its (resolved) destination account
//! - a buy or sell links the account to its owner's wallets
//!
//! Groups touch disjoint rows, so they run in separate tokio tasks while
//! each group is replayed sequentially in file order. The final state is the
//! one a plain sequential replay of the same file produces.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── Arc<TransferEngine>  (shared, thread-safe engine)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::engine::TransferEngine;
use crate::types::{
    AccountId, AccountNumber, LedgerError, OperationOutcome, OperationRecord, OperationType,
    OwnerId,
};

/// Result of processing a single operation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The operation record that was processed
    pub record: OperationRecord,

    /// The outcome of processing (receipt or error)
    pub result: Result<OperationOutcome, LedgerError>,
}

/// Rows an operation may touch, at the granularity used for grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Node {
    Account(AccountId),
    Wallets(OwnerId),
}

/// Union-find over node indices
#[derive(Debug, Default)]
struct DisjointSets {
    parent: Vec<usize>,
    index: HashMap<Node, usize>,
}

impl DisjointSets {
    fn node(&mut self, node: Node) -> usize {
        if let Some(&i) = self.index.get(&node) {
            return i;
        }
        let i = self.parent.len();
        self.parent.push(i);
        self.index.insert(node, i);
        i
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Batch processor with connected-group partitioning
///
/// Cloneable; clones share the same engine.
#[derive(Clone)]
pub struct BatchProcessor {
    engine: Arc<TransferEngine>,
}

impl BatchProcessor {
    pub fn new(engine: Arc<TransferEngine>) -> Self {
        Self { engine }
    }

    /// Nodes besides its own account that `record` may touch
    fn linked_node(&self, record: &OperationRecord) -> Option<Node> {
        let ledger = self.engine.ledger();
        match record.op {
            OperationType::Transfer => record
                .target
                .as_deref()
                .and_then(|target| AccountNumber::parse(target).ok())
                .and_then(|number| ledger.resolve_number(&number))
                .map(Node::Account),
            OperationType::Buy | OperationType::Sell => ledger
                .account(record.account)
                .ok()
                .map(|account| Node::Wallets(account.owner)),
            OperationType::Deposit | OperationType::Withdraw => None,
        }
    }

    /// Partition a batch into groups that share no rows
    ///
    /// # Guarantees
    ///
    /// - Each record appears in exactly one group
    /// - Records within a group keep their original order
    /// - Groups are ordered by their first record
    pub fn partition(&self, batch: Vec<OperationRecord>) -> Vec<Vec<OperationRecord>> {
        let mut sets = DisjointSets::default();

        let anchors: Vec<usize> = batch
            .iter()
            .map(|record| {
                let own = sets.node(Node::Account(record.account));
                if let Some(linked) = self.linked_node(record) {
                    let linked = sets.node(linked);
                    sets.union(own, linked);
                }
                own
            })
            .collect();

        let mut group_of_root: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<Vec<OperationRecord>> = Vec::new();

        for (record, anchor) in batch.into_iter().zip(anchors) {
            let root = sets.find(anchor);
            let group = *group_of_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[group].push(record);
        }

        groups
    }

    /// Process one group sequentially
    ///
    /// Errors are captured per record and don't stop the group.
    pub fn process_group(&self, records: Vec<OperationRecord>) -> Vec<ProcessingResult> {
        records
            .into_iter()
            .map(|record| {
                let result = self.engine.process(&record);
                ProcessingResult { record, result }
            })
            .collect()
    }

    /// Process a batch with one tokio task per connected group
    ///
    /// Results are grouped, so they may come back in a different order than
    /// the input.
    pub async fn process_batch(&self, batch: Vec<OperationRecord>) -> Vec<ProcessingResult> {
        let groups = self.partition(batch);

        let tasks: Vec<_> = groups
            .into_iter()
            .map(|records| {
                let processor = self.clone();
                tokio::spawn(async move { processor.process_group(records) })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(group_results) => results.extend(group_results),
                Err(e) => tracing::error!(error = %e, "batch group task failed"),
            }
        }

        results
    }
}
