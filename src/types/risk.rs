//! Risk scoring types

use super::account::AccountId;
use super::transaction::TransactionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorical bucket derived from a numeric anomaly score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// MEDIUM and HIGH signals raise an alert
    pub fn raises_alert(&self) -> bool {
        !matches!(self, RiskTier::Low)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        };
        f.write_str(label)
    }
}

/// Status mutation taken as a consequence of a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeAction {
    /// The account moved from active to frozen
    Frozen,
    /// Freezing was warranted but the account was no longer active
    AlreadyInactive,
}

/// Outcome of scoring one committed transaction
///
/// Written once per transaction id and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub score: u8,
    pub tier: RiskTier,
    pub freeze: Option<FreezeAction>,
    pub created_at: DateTime<Utc>,
}

impl RiskSignal {
    pub fn is_alert(&self) -> bool {
        self.tier.raises_alert()
    }
}
