//! Risk scoring of committed movements
//!
//! Every committed log entry is scored once, after its atomic unit has
//! committed. Scoring only reads committed state and appends a `RiskSignal`;
//! it never reverses the movement. A HIGH score at or above the freeze
//! cut-off freezes the account as a separate mutation.
//!
//! The score is additive and capped at 100:
//!
//! | Heuristic                                         | Weight |
//! |---------------------------------------------------|--------|
//! | amount above the high-amount threshold            | +30    |
//! | entries in the trailing hour at or above velocity | +25    |
//! | local hour inside the night window                | +15    |
//! | amount above N x the trailing 30-day average      | +20    |
//! | round amount (multiple of 100, at least 1000)     | +10    |

use crate::config::RiskConfig;
use crate::core::ledger_store::LedgerStore;
use crate::core::traits::RiskDispatcher;
use crate::types::{
    FreezeAction, LedgerError, RiskSignal, RiskTier, TransactionId, TransactionLogEntry,
};
use chrono::{DateTime, Duration, Local, Timelike, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

const HIGH_AMOUNT_WEIGHT: u32 = 30;
const VELOCITY_WEIGHT: u32 = 25;
const NIGHT_WEIGHT: u32 = 15;
const UNUSUAL_AMOUNT_WEIGHT: u32 = 20;
const ROUND_NUMBER_WEIGHT: u32 = 10;
const MAX_SCORE: u32 = 100;

/// Everything the scoring heuristics look at
#[derive(Debug, Clone, PartialEq)]
pub struct RiskInputs {
    /// Absolute amount of the movement
    pub amount: Decimal,
    /// Entries on the account in the trailing hour, this one included
    pub recent_count: usize,
    /// Mean absolute amount over the trailing 30 days, this one included
    pub trailing_average: Option<Decimal>,
    /// Local wall-clock hour, 0 to 23
    pub hour: u32,
}

/// Append-only store of risk signals, one per transaction
#[derive(Debug, Default)]
pub struct RiskSignalStore {
    signals: DashMap<TransactionId, RiskSignal>,
}

impl RiskSignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `signal` unless one exists for the transaction; returns the stored one
    pub fn record(&self, signal: RiskSignal) -> RiskSignal {
        self.signals
            .entry(signal.transaction_id)
            .or_insert(signal)
            .value()
            .clone()
    }

    pub fn get(&self, transaction_id: TransactionId) -> Option<RiskSignal> {
        self.signals.get(&transaction_id).map(|s| s.value().clone())
    }

    /// MEDIUM and HIGH signals, newest first
    pub fn alerts(&self, limit: usize) -> Vec<RiskSignal> {
        let mut alerts: Vec<RiskSignal> = self
            .signals
            .iter()
            .filter(|s| s.is_alert())
            .map(|s| s.value().clone())
            .collect();
        alerts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.transaction_id.cmp(&a.transaction_id))
        });
        alerts.truncate(limit);
        alerts
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Heuristic anomaly scorer
pub struct RiskScorer {
    config: RiskConfig,
    ledger: Arc<LedgerStore>,
    signals: Arc<RiskSignalStore>,
}

impl RiskScorer {
    pub fn new(config: RiskConfig, ledger: Arc<LedgerStore>, signals: Arc<RiskSignalStore>) -> Self {
        RiskScorer {
            config,
            ledger,
            signals,
        }
    }

    pub fn signals(&self) -> &RiskSignalStore {
        &self.signals
    }

    /// Additive score of a movement, capped at 100
    pub fn score(&self, inputs: &RiskInputs) -> u8 {
        let c = &self.config;
        let amount = inputs.amount.abs();
        let mut score = 0;

        if amount > c.high_amount {
            score += HIGH_AMOUNT_WEIGHT;
        }
        if inputs.recent_count >= c.velocity_limit {
            score += VELOCITY_WEIGHT;
        }
        if self.is_night(inputs.hour) {
            score += NIGHT_WEIGHT;
        }
        if let Some(average) = inputs.trailing_average.filter(|a| *a > Decimal::ZERO) {
            if average
                .checked_mul(c.average_multiplier)
                .is_some_and(|limit| amount > limit)
            {
                score += UNUSUAL_AMOUNT_WEIGHT;
            }
        }
        if amount >= c.round_number_floor && (amount % c.round_number_unit).is_zero() {
            score += ROUND_NUMBER_WEIGHT;
        }

        score.min(MAX_SCORE) as u8
    }

    pub fn tier(&self, score: u8) -> RiskTier {
        if score >= self.config.high_score {
            RiskTier::High
        } else if score >= self.config.medium_score {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    /// Night window, wrapping past midnight when start > end
    fn is_night(&self, hour: u32) -> bool {
        let (start, end) = (self.config.night_start_hour, self.config.night_end_hour);
        if start <= end {
            (start..=end).contains(&hour)
        } else {
            hour >= start || hour <= end
        }
    }

    /// Score a committed entry at the current local time
    pub fn evaluate(&self, entry: &TransactionLogEntry) -> Result<RiskSignal, LedgerError> {
        self.evaluate_at(entry, Local::now())
    }

    /// Score a committed entry as if the wall clock read `now`
    ///
    /// History windows end at the entry's own timestamp, so a delayed or
    /// repeated evaluation sees the same history. A transaction that already
    /// has a signal gets that signal back and no second freeze.
    pub fn evaluate_at(
        &self,
        entry: &TransactionLogEntry,
        now: DateTime<Local>,
    ) -> Result<RiskSignal, LedgerError> {
        if let Some(existing) = self.signals.get(entry.id) {
            return Ok(existing);
        }

        let at = entry.created_at;
        let inputs = RiskInputs {
            amount: entry.amount.abs(),
            recent_count: self
                .ledger
                .count_entries_between(entry.account_id, at - Duration::hours(1), at),
            trailing_average: self
                .ledger
                .average_amount_between(entry.account_id, at - Duration::days(30), at),
            hour: now.hour(),
        };

        let score = self.score(&inputs);
        let tier = self.tier(score);

        let freeze = if tier == RiskTier::High && score >= self.config.freeze_score {
            if self.ledger.freeze(entry.account_id)? {
                tracing::warn!(account = entry.account_id, tx = entry.id, score, "account frozen");
                Some(FreezeAction::Frozen)
            } else {
                Some(FreezeAction::AlreadyInactive)
            }
        } else {
            None
        };

        match tier {
            RiskTier::High => {
                tracing::warn!(account = entry.account_id, tx = entry.id, score, "high risk movement")
            }
            RiskTier::Medium => {
                tracing::info!(account = entry.account_id, tx = entry.id, score, "medium risk movement")
            }
            RiskTier::Low => {}
        }

        Ok(self.signals.record(RiskSignal {
            transaction_id: entry.id,
            account_id: entry.account_id,
            score,
            tier,
            freeze,
            created_at: Utc::now(),
        }))
    }

    /// Latest alerts; `None` uses the configured page size
    pub fn alerts(&self, limit: Option<usize>) -> Vec<RiskSignal> {
        self.signals.alerts(limit.unwrap_or(self.config.alert_limit))
    }
}

/// Scores entries on the caller's thread right after commit
pub struct InlineRiskDispatcher {
    scorer: Arc<RiskScorer>,
}

impl InlineRiskDispatcher {
    pub fn new(scorer: Arc<RiskScorer>) -> Self {
        Self { scorer }
    }
}

impl RiskDispatcher for InlineRiskDispatcher {
    fn dispatch(&self, entries: &[TransactionLogEntry]) {
        for entry in entries {
            if let Err(e) = self.scorer.evaluate(entry) {
                tracing::error!(tx = entry.id, error = %e, "risk scoring failed");
            }
        }
    }
}
