//! C7/C8 shared types: [`ValidationIssue`] and [`AlertState`]
//!.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Rule {
    WhitelistViolation,
    BlacklistViolation,
    ConfigError,
    LeverageLimit,
    MarginShareLimit,
    TotalMarginUsage,
    FundingRateLimit,
    DataMissing,
    OiShareLimit,
    OiMinimum,
    MarketCapMinimum,
    Volume24hMinimum,
    ConcentrationHhiLimit,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum IssueDirection {
    Long,
    Short,
    Global,
}

impl From<crate::account::Direction> for IssueDirection {
    fn from(d: crate::account::Direction) -> Self {
        match d {
            crate::account::Direction::Long => IssueDirection::Long,
            crate::account::Direction::Short => IssueDirection::Short,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Severity {
    Warning,
    Critical,
}

/// Account-wide issues use this sentinel in place of a real
/// base asset.
pub const ACCOUNT_SCOPE: &str = "__account__";

/// One rule violation surfaced by C7.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValidationIssue {
    pub rule: Rule,
    pub base_asset: String,
    pub direction: IssueDirection,
    pub severity: Severity,
    pub message: String,
    pub cooldown_minutes: u32,
    pub notify_on_recovery: bool,
    pub value: Option<Decimal>,
    pub threshold: Option<Decimal>,
    pub details: Option<String>,
}

impl ValidationIssue {
    /// Dedup/cooldown identity: `(rule, baseAsset, direction)`.
    pub fn identity(&self) -> (Rule, String, IssueDirection) {
        (self.rule, self.base_asset.clone(), self.direction)
    }
}

/// C8's per-issue cooldown bookkeeping.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlertState {
    pub last_issue: ValidationIssue,
    pub first_detected_at: DateTime<Utc>,
    pub last_sent_at: DateTime<Utc>,
    pub notify_on_recovery: bool,
}
