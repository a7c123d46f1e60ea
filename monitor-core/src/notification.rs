//! Emission payloads handed from C5/C6/C9 to the external card-rendering
//! and webhook-dispatch collaborators.
//!
//! These structs are deliberately plain data: optional fields that have no
//! value stay absent (`None`) rather than being defaulted, so a renderer
//! can tell "not applicable" apart from "zero".

use crate::order::classify::Source;
use crate::validation::ValidationIssue;
use chrono::{DateTime, Utc};

/// The closed set of order-lifecycle/fill scenarios.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Scenario {
    SltpNew,
    SltpPartialTimeout,
    SltpPartialCompleted,
    SltpFilled,
    SltpPartialCanceled,
    SltpCanceled,
    GeneralTimeout,
    GeneralAggregated,
    GeneralSingle,
    GeneralPartialCanceled,
}

impl Scenario {
    /// Chinese state label shown in the card header.
    pub fn state_label(self) -> &'static str {
        match self {
            Scenario::SltpNew => "创建",
            Scenario::SltpPartialTimeout | Scenario::GeneralTimeout => "部分成交",
            Scenario::SltpPartialCompleted
            | Scenario::SltpFilled
            | Scenario::GeneralAggregated
            | Scenario::GeneralSingle => "成交",
            Scenario::SltpPartialCanceled | Scenario::SltpCanceled => "取消",
            Scenario::GeneralPartialCanceled => "取消",
        }
    }

    /// `true` when the notification routes to the fill sink rather than the
    /// life-cycle sink.
    pub fn is_fill(self) -> bool {
        matches!(
            self,
            Scenario::SltpPartialCompleted
                | Scenario::SltpFilled
                | Scenario::GeneralAggregated
                | Scenario::GeneralSingle
        )
    }

    /// `true` when the scenario's aggregates (cumulative notional / PnL /
    /// long-short ratio) should be computed and included, subject to the
    /// `cumulativeQty>0 && cumulativeQuote>0` gate.
    pub fn includes_cumulative(self) -> bool {
        !matches!(self, Scenario::SltpNew)
    }

    /// Which price field the emission prefers.
    pub fn price_source(self) -> PriceSource {
        match self {
            Scenario::SltpNew | Scenario::SltpCanceled | Scenario::SltpPartialCanceled => {
                PriceSource::Order
            }
            _ => PriceSource::Average,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PriceSource {
    Average,
    Order,
}

/// A single life-cycle or fill notification.
///
/// `scenario` is `None` exactly when this notification was built directly
/// from an `EXPIRED` event bypassing C5's closed scenario set.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderNotification {
    pub scenario: Option<Scenario>,
    pub symbol: String,
    pub order_id: u64,
    pub client_order_id: String,
    pub source: Source,
    pub title: String,
    pub state_label: String,
    pub display_price: String,
    pub cumulative_quote_display: Option<String>,
    pub cumulative_quote_ratio_display: Option<String>,
    pub trade_pnl_display: Option<String>,
    pub long_short_ratio_display: Option<String>,
    pub long_short_ratio_raw: Option<String>,
    /// Populated only for CANCELED/EXPIRED life-cycle notifications
    ///.
    pub expiry_reason: Option<String>,
    pub emitted_at: DateTime<Utc>,
}

impl OrderNotification {
    /// `true` routes to the fill sink; `false` routes to the life-cycle
    /// sink.
    pub fn is_fill(&self) -> bool {
        self.scenario.is_some_and(Scenario::is_fill)
    }
}

/// One alert/recovery line contributed to a digest card.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEventKind {
    Alert { repeat: bool },
    Recovery,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub issue: ValidationIssue,
    pub kind: AlertEventKind,
    pub first_detected_at: DateTime<Utc>,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DigestColor {
    Green,
    Red,
    Orange,
    Blue,
}

/// Single aggregated alert-sink message combining every event from one
/// validation tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestCard {
    pub events: Vec<AlertEvent>,
    pub color: DigestColor,
}

impl DigestCard {
    /// Builds a digest from a tick's events, deriving the header color per
    /// Section 4.9: green iff all recoveries; else red if any critical
    /// non-recovery; else orange if any warning non-recovery; else blue.
    pub fn from_events(events: Vec<AlertEvent>) -> Self {
        let color = Self::derive_color(&events);
        Self { events, color }
    }

    fn derive_color(events: &[AlertEvent]) -> DigestColor {
        use crate::validation::Severity;

        let all_recoveries = !events.is_empty()
            && events
                .iter()
                .all(|e| matches!(e.kind, AlertEventKind::Recovery));
        if all_recoveries {
            return DigestColor::Green;
        }

        let has_critical_alert = events.iter().any(|e| {
            matches!(e.kind, AlertEventKind::Alert { .. }) && e.issue.severity == Severity::Critical
        });
        if has_critical_alert {
            return DigestColor::Red;
        }

        let has_warning_alert = events
            .iter()
            .any(|e| matches!(e.kind, AlertEventKind::Alert { .. }));
        if has_warning_alert {
            return DigestColor::Orange;
        }

        DigestColor::Blue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{IssueDirection, Rule, Severity, ValidationIssue};

    fn issue(severity: Severity) -> ValidationIssue {
        ValidationIssue {
            rule: Rule::LeverageLimit,
            base_asset: "ETH".to_string(),
            direction: IssueDirection::Long,
            severity,
            message: "x".to_string(),
            cooldown_minutes: 0,
            notify_on_recovery: true,
            value: None,
            threshold: None,
            details: None,
        }
    }

    #[test]
    fn all_recoveries_is_green() {
        let now = Utc::now();
        let events = vec![AlertEvent {
            issue: issue(Severity::Critical),
            kind: AlertEventKind::Recovery,
            first_detected_at: now,
            triggered_at: now,
        }];
        assert_eq!(DigestCard::from_events(events).color, DigestColor::Green);
    }

    #[test]
    fn critical_alert_wins_over_warning() {
        let now = Utc::now();
        let events = vec![
            AlertEvent {
                issue: issue(Severity::Warning),
                kind: AlertEventKind::Alert { repeat: false },
                first_detected_at: now,
                triggered_at: now,
            },
            AlertEvent {
                issue: issue(Severity::Critical),
                kind: AlertEventKind::Alert { repeat: false },
                first_detected_at: now,
                triggered_at: now,
            },
        ];
        assert_eq!(DigestCard::from_events(events).color, DigestColor::Red);
    }

    #[test]
    fn empty_events_is_blue() {
        assert_eq!(DigestCard::from_events(vec![]).color, DigestColor::Blue);
    }
}
