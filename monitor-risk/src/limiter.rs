//! C8 — cooldown + floor alert limiter.
//!
//! Issues are keyed by `(rule, baseAsset, direction)`. A fresh issue
//! fires immediately; a recurring issue is suppressed until its effective
//! cooldown (`max(issue.cooldownMinutes, floor)`) elapses; a cleared issue
//! fires a recovery notice once, if the rule that raised it opted in.
//! Event ordering within a batch: all alerts in input order, then
//! recoveries in state-iteration order.

use chrono::{DateTime, Utc};
use monitor_core::notification::{AlertEvent, AlertEventKind};
use monitor_core::validation::{AlertState, Rule, ValidationIssue};
use std::collections::HashMap;

type Identity = (Rule, String, monitor_core::validation::IssueDirection);

/// Minimum spacing between repeat alerts for the same issue identity,
/// regardless of the issue's own `cooldownMinutes`.
const COOLDOWN_FLOOR: chrono::Duration = chrono::Duration::minutes(60);

/// Stateful cooldown tracker, one instance shared across validation ticks.
#[derive(Debug, Default)]
pub struct AlertLimiter {
    active: HashMap<Identity, AlertState>,
}

impl AlertLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds this tick's issues against prior state, returning ordered
    /// alert/recovery events. Call once per validation tick with the full
    /// current issue set.
    pub fn process(&mut self, issues: &[ValidationIssue], now: DateTime<Utc>) -> Vec<AlertEvent> {
        let mut events = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for issue in issues {
            let identity = issue.identity();
            seen.insert(identity.clone());

            match self.active.get_mut(&identity) {
                None => {
                    self.active.insert(
                        identity,
                        AlertState {
                            last_issue: issue.clone(),
                            first_detected_at: now,
                            last_sent_at: now,
                            notify_on_recovery: issue.notify_on_recovery,
                        },
                    );
                    events.push(AlertEvent {
                        issue: issue.clone(),
                        kind: AlertEventKind::Alert { repeat: false },
                        first_detected_at: now,
                        triggered_at: now,
                    });
                }
                Some(state) => {
                    let cooldown = chrono::Duration::minutes(issue.cooldown_minutes as i64).max(COOLDOWN_FLOOR);
                    state.last_issue = issue.clone();
                    state.notify_on_recovery = issue.notify_on_recovery;
                    if now - state.last_sent_at >= cooldown {
                        state.last_sent_at = now;
                        events.push(AlertEvent {
                            issue: issue.clone(),
                            kind: AlertEventKind::Alert { repeat: true },
                            first_detected_at: state.first_detected_at,
                            triggered_at: now,
                        });
                    }
                }
            }
        }

        let cleared: Vec<Identity> = self
            .active
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for identity in cleared {
            if let Some(state) = self.active.remove(&identity) {
                if state.notify_on_recovery {
                    events.push(AlertEvent {
                        issue: state.last_issue,
                        kind: AlertEventKind::Recovery,
                        first_detected_at: state.first_detected_at,
                        triggered_at: now,
                    });
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::validation::{IssueDirection, Severity};

    fn issue(rule: Rule, asset: &str, cooldown_minutes: u32) -> ValidationIssue {
        ValidationIssue {
            rule,
            base_asset: asset.to_string(),
            direction: IssueDirection::Global,
            severity: Severity::Warning,
            message: "test".to_string(),
            cooldown_minutes,
            notify_on_recovery: true,
            value: None,
            threshold: None,
            details: None,
        }
    }

    #[test]
    fn fresh_issue_fires_once_and_respects_cooldown() {
        let mut limiter = AlertLimiter::new();
        let t0 = Utc::now();
        let events = limiter.process(&[issue(Rule::DataMissing, "BTC", 30)], t0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertEventKind::Alert { repeat: false });

        let t1 = t0 + chrono::Duration::minutes(5);
        let events = limiter.process(&[issue(Rule::DataMissing, "BTC", 30)], t1);
        assert!(events.is_empty());

        let t2 = t0 + chrono::Duration::minutes(61);
        let events = limiter.process(&[issue(Rule::DataMissing, "BTC", 30)], t2);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertEventKind::Alert { repeat: true });
    }

    #[test]
    fn cooldown_floor_overrides_a_shorter_per_issue_cooldown() {
        let mut limiter = AlertLimiter::new();
        let t0 = Utc::now();
        limiter.process(&[issue(Rule::LeverageLimit, "ETH", 0)], t0);

        let t1 = t0 + chrono::Duration::minutes(30);
        assert!(limiter.process(&[issue(Rule::LeverageLimit, "ETH", 0)], t1).is_empty());

        let t2 = t0 + chrono::Duration::minutes(61);
        let events = limiter.process(&[issue(Rule::LeverageLimit, "ETH", 0)], t2);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertEventKind::Alert { repeat: true });
    }

    #[test]
    fn cleared_issue_emits_recovery_once() {
        let mut limiter = AlertLimiter::new();
        let t0 = Utc::now();
        limiter.process(&[issue(Rule::DataMissing, "BTC", 0)], t0);

        let t1 = t0 + chrono::Duration::minutes(1);
        let events = limiter.process(&[], t1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertEventKind::Recovery);

        let t2 = t1 + chrono::Duration::minutes(1);
        let events = limiter.process(&[], t2);
        assert!(events.is_empty());
    }

    #[test]
    fn recovery_suppressed_when_opted_out() {
        let mut limiter = AlertLimiter::new();
        let mut no_recovery = issue(Rule::DataMissing, "BTC", 0);
        no_recovery.notify_on_recovery = false;
        let t0 = Utc::now();
        limiter.process(&[no_recovery], t0);

        let events = limiter.process(&[], t0 + chrono::Duration::minutes(1));
        assert!(events.is_empty());
    }

    #[test]
    fn alerts_precede_recoveries_within_a_batch() {
        let mut limiter = AlertLimiter::new();
        let t0 = Utc::now();
        limiter.process(&[issue(Rule::DataMissing, "BTC", 0)], t0);

        let t1 = t0 + chrono::Duration::minutes(1);
        let events = limiter.process(&[issue(Rule::LeverageLimit, "ETH", 0)], t1);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].kind, AlertEventKind::Alert { .. }));
        assert_eq!(events[1].kind, AlertEventKind::Recovery);
    }
}
