//! C6 — notification dispatcher.
//!
//! Splits C5's emissions across two sinks and additionally handles
//! `EXPIRED` events directly (C5's closed scenario set never produces an
//! EXPIRED emission — this path exists precisely for the events C5 does
//! not handle), each under its own independent 60 s dedup.

use crate::dedup::TtlSet;
use monitor_core::notification::OrderNotification;
use monitor_core::ports::{BoxNotificationSink, CardPayload};
use std::time::Duration;
use tracing::warn;

const DISPATCH_DEDUP_TTL: Duration = Duration::from_secs(60);

/// Renders a [`OrderNotification`] into the opaque payload the webhook
/// sinks ship.
pub trait OrderCardBuilder: Send + Sync {
    fn build(&self, notification: &OrderNotification) -> CardPayload;
}

/// Derives the Chinese expiry-reason string from the event's raw
/// execution-type field.
pub fn expiry_reason(exec_type: &str) -> String {
    match exec_type {
        "EXPIRED_IN_MATCH" => "撮合过程中超时 (EXPIRED_IN_MATCH)".to_string(),
        "EXPIRED" => "超过有效期自动过期".to_string(),
        "" => "订单超时未成交".to_string(),
        other => format!("执行状态: {other}"),
    }
}

pub struct NotificationDispatcher {
    lifecycle_sink: BoxNotificationSink,
    fill_sink: BoxNotificationSink,
    dedup: TtlSet,
    card_builder: Box<dyn OrderCardBuilder>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(
        lifecycle_sink: BoxNotificationSink,
        fill_sink: BoxNotificationSink,
        card_builder: Box<dyn OrderCardBuilder>,
    ) -> Self {
        Self {
            lifecycle_sink,
            fill_sink,
            dedup: TtlSet::new(DISPATCH_DEDUP_TTL),
            card_builder,
        }
    }

    fn dedup_key(notification: &OrderNotification) -> String {
        format!(
            "{}|{}|{}|{:?}|{}",
            notification.symbol,
            notification.order_id,
            notification.client_order_id,
            notification.scenario,
            notification.emitted_at.timestamp_millis(),
        )
    }

    /// Routes a C5 emission to the correct sink.
    pub async fn dispatch(&mut self, notification: OrderNotification) {
        let key = Self::dedup_key(&notification);
        if self.dedup.contains(&key) {
            return;
        }
        self.dedup.insert(key);

        let card = self.card_builder.build(&notification);
        let sink = if notification.is_fill() {
            &self.fill_sink
        } else {
            &self.lifecycle_sink
        };

        if let Err(err) = sink.send(card).await {
            warn!(error = %err, symbol = %notification.symbol, "notification sink rejected payload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_reason_matches_each_case() {
        assert_eq!(
            expiry_reason("EXPIRED_IN_MATCH"),
            "撮合过程中超时 (EXPIRED_IN_MATCH)"
        );
        assert_eq!(expiry_reason("EXPIRED"), "超过有效期自动过期");
        assert_eq!(expiry_reason(""), "订单超时未成交");
        assert_eq!(expiry_reason("TRADE"), "执行状态: TRADE");
    }
}
