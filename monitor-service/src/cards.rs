//! Card payload rendering. `monitor-engine`/`monitor-risk` expose
//! typed emission structs; this module is the concrete (if minimal)
//! renderer that turns them into the JSON body the webhook sinks POST.

use monitor_core::notification::{AlertEvent, AlertEventKind, DigestCard, DigestColor, OrderNotification};
use monitor_core::ports::CardPayload;
use monitor_core::validation::Rule;
use monitor_engine::OrderCardBuilder;
use serde_json::json;

/// Chinese label for each [`Rule`] variant, shown in the digest card
///.
fn rule_label(rule: Rule) -> &'static str {
    match rule {
        Rule::WhitelistViolation => "白名单校验",
        Rule::BlacklistViolation => "黑名单命中",
        Rule::ConfigError => "规则配置冲突",
        Rule::LeverageLimit => "杠杆超限",
        Rule::MarginShareLimit => "保证金占比超限",
        Rule::TotalMarginUsage => "总保证金使用率超限",
        Rule::FundingRateLimit => "资金费率超限",
        Rule::DataMissing => "数据缺失",
        Rule::OiShareLimit => "未平仓合约占比超限",
        Rule::OiMinimum => "未平仓合约不足",
        Rule::MarketCapMinimum => "市值不足",
        Rule::Volume24hMinimum => "24小时成交量不足",
        Rule::ConcentrationHhiLimit => "集中度超限",
    }
}

fn digest_color_hex(color: DigestColor) -> &'static str {
    match color {
        DigestColor::Green => "#2ecc71",
        DigestColor::Red => "#e74c3c",
        DigestColor::Orange => "#e67e22",
        DigestColor::Blue => "#3498db",
    }
}

fn alert_event_json(event: &AlertEvent) -> serde_json::Value {
    let (status_label, repeat) = match event.kind {
        AlertEventKind::Alert { repeat } => ("告警", repeat),
        AlertEventKind::Recovery => ("恢复", false),
    };

    json!({
        "rule": rule_label(event.issue.rule),
        "baseAsset": event.issue.base_asset,
        "direction": format!("{:?}", event.issue.direction),
        "severity": format!("{:?}", event.issue.severity),
        "status": status_label,
        "repeat": repeat,
        "message": event.issue.message,
        "value": event.issue.value,
        "threshold": event.issue.threshold,
        "details": event.issue.details,
        "firstDetectedAt": event.first_detected_at.to_rfc3339(),
        "triggeredAt": event.triggered_at.to_rfc3339(),
    })
}

/// Renders the single aggregated alert-sink message for one validation
/// tick.
pub fn render_digest(card: &DigestCard) -> CardPayload {
    CardPayload(json!({
        "color": digest_color_hex(card.color),
        "events": card.events.iter().map(alert_event_json).collect::<Vec<_>>(),
    }))
}

/// Minimal [`OrderCardBuilder`] producing a flat JSON body for the two
/// order-event webhooks (lifecycle, fill).
#[derive(Debug, Default)]
pub struct OrderCard;

impl OrderCardBuilder for OrderCard {
    fn build(&self, notification: &OrderNotification) -> CardPayload {
        CardPayload(json!({
            "title": notification.title,
            "state": notification.state_label,
            "symbol": notification.symbol,
            "orderId": notification.order_id,
            "clientOrderId": notification.client_order_id,
            "source": format!("{:?}", notification.source),
            "displayPrice": notification.display_price,
            "cumulativeQuote": notification.cumulative_quote_display,
            "cumulativeQuoteRatio": notification.cumulative_quote_ratio_display,
            "tradePnl": notification.trade_pnl_display,
            "longShortRatio": notification.long_short_ratio_display,
            "expiryReason": notification.expiry_reason,
            "emittedAt": notification.emitted_at.to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use monitor_core::validation::{IssueDirection, Severity, ValidationIssue};

    #[test]
    fn digest_color_matches_severity_rules() {
        assert_eq!(digest_color_hex(DigestColor::Red), "#e74c3c");
    }

    #[test]
    fn renders_digest_with_translated_rule_labels() {
        let now = Utc::now();
        let issue = ValidationIssue {
            rule: Rule::LeverageLimit,
            base_asset: "ETH".to_string(),
            direction: IssueDirection::Long,
            severity: Severity::Warning,
            message: "m".to_string(),
            cooldown_minutes: 0,
            notify_on_recovery: true,
            value: None,
            threshold: None,
            details: None,
        };
        let card = DigestCard::from_events(vec![AlertEvent {
            issue,
            kind: AlertEventKind::Alert { repeat: false },
            first_detected_at: now,
            triggered_at: now,
        }]);
        let payload = render_digest(&card);
        assert_eq!(payload.0["events"][0]["rule"], "杠杆超限");
    }
}
