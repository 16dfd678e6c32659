//! Asynchronous processing components
//!
//! This module provides the pieces the asynchronous pipeline adds on top of
//! the thread-safe core:
//!
//! - **BatchProcessor**: runs connected groups of a batch as parallel tokio tasks
//! - **RiskWorker**: background task scoring committed entries queued by
//!   `QueuedRiskDispatcher`
//!
//! # Thread Safety
//!
//! The ledger and wallet stores lock per row, so operations on disjoint rows
//! proceed in parallel and operations on the same row are linearized.

pub mod batch_processor;
pub mod risk_worker;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use risk_worker::{spawn_risk_worker, QueuedRiskDispatcher, RiskWorker, RiskWorkerReport};
