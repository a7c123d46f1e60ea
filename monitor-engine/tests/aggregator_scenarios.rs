//! End-to-end aggregator scenarios (Section 8's literal cases), driven
//! through the real `OrderAggregator::run` message loop rather than its
//! private helpers.

use async_trait::async_trait;
use chrono::Utc;
use monitor_core::account::AccountContext;
use monitor_core::notification::{OrderNotification, Scenario};
use monitor_core::order::{OrderEvent, OrderIdentity, OrderStatus, OrderType, PositionSide, Side};
use monitor_core::ports::{AccountDataSource, PortError};
use monitor_engine::account_metrics::AccountMetricsProvider;
use monitor_engine::aggregator::{AggregatorMessage, OrderAggregator};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct StubAccountSource(Decimal);

#[async_trait]
impl AccountDataSource for StubAccountSource {
    async fn fetch_account(&self) -> Result<AccountContext, PortError> {
        Ok(AccountContext {
            total_initial_margin: Decimal::ZERO,
            total_margin_balance: self.0,
            available_balance: self.0,
            snapshots: Vec::new(),
            fetched_at: Utc::now(),
        })
    }
}

fn base_event(client_order_id: &str, order_id: u64, status: OrderStatus) -> OrderEvent {
    OrderEvent {
        identity: OrderIdentity {
            symbol: "BTCUSDT".to_string(),
            order_id,
            client_order_id: client_order_id.to_string(),
        },
        original_client_order_id: None,
        status,
        side: Side::Buy,
        position_side: PositionSide::Both,
        order_type: OrderType::Limit,
        exec_type: "TRADE".to_string(),
        is_maker: false,
        event_time: Utc::now(),
        trade_time: Utc::now(),
        original_qty: dec!(1),
        cumulative_qty: Decimal::ZERO,
        last_qty: Decimal::ZERO,
        average_price: Decimal::ZERO,
        last_price: Decimal::ZERO,
        order_price: dec!(45000),
        stop_price: Decimal::ZERO,
        activation_price: None,
        callback_rate: None,
        realized_pnl: None,
    }
}

/// Wires a fresh aggregator against a 100000 USDT account and returns the
/// inbound event sender plus the notification receiver.
fn harness(
    total_funds: Decimal,
) -> (
    mpsc::UnboundedSender<AggregatorMessage>,
    mpsc::UnboundedReceiver<OrderNotification>,
    tokio::sync::watch::Sender<bool>,
) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let account_metrics = Arc::new(AccountMetricsProvider::with_default_ttl(Arc::new(
        StubAccountSource(total_funds),
    )));
    let aggregator = OrderAggregator::new(account_metrics, Duration::from_millis(150), in_tx.clone(), notify_tx);
    tokio::spawn(aggregator.run(in_rx, shutdown_rx));
    (in_tx, notify_rx, shutdown_tx)
}

#[tokio::test]
async fn scenario_1_general_single_fill() {
    let (tx, mut rx, _shutdown) = harness(dec!(100000));

    let mut e = base_event("ORD-1", 1, OrderStatus::Filled);
    e.original_qty = dec!(1);
    e.cumulative_qty = dec!(1);
    e.last_qty = dec!(1);
    e.average_price = dec!(45000);
    e.order_price = dec!(45000);
    tx.send(AggregatorMessage::Event(e)).unwrap();

    let notification = rx.recv().await.expect("expected one notification");
    assert_eq!(notification.scenario, Some(Scenario::GeneralSingle));
    assert_eq!(notification.title, "BTCUSDT-其他");
    assert_eq!(notification.display_price, "45000.00000000");
    assert_eq!(notification.cumulative_quote_display.as_deref(), Some("45000.00 USDT"));
    assert_eq!(notification.cumulative_quote_ratio_display.as_deref(), Some("45.00%"));
    assert_eq!(notification.trade_pnl_display.as_deref(), Some("0.00 USDT"));
    assert_eq!(notification.long_short_ratio_display, None);
}

#[tokio::test]
async fn scenario_2_general_aggregated_single_emission() {
    let (tx, mut rx, _shutdown) = harness(dec!(100000));

    let mut partial = base_event("ORD-2", 2, OrderStatus::PartiallyFilled);
    partial.cumulative_qty = dec!(0.5);
    partial.last_qty = dec!(0.5);
    partial.average_price = dec!(45000);
    tx.send(AggregatorMessage::Event(partial)).unwrap();

    let mut filled = base_event("ORD-2", 2, OrderStatus::Filled);
    filled.cumulative_qty = dec!(1);
    filled.last_qty = dec!(0.5);
    filled.average_price = dec!(45000);
    tx.send(AggregatorMessage::Event(filled)).unwrap();

    let notification = rx.recv().await.expect("expected one notification");
    assert_eq!(notification.scenario, Some(Scenario::GeneralAggregated));
    assert_eq!(notification.cumulative_quote_display.as_deref(), Some("45000.00 USDT"));

    // No second notification arrives even after the window would have elapsed.
    let second = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(second.is_err(), "expected no further emission, got {second:?}");
}

#[tokio::test]
async fn scenario_3_timeout_then_rearm() {
    let (tx, mut rx, _shutdown) = harness(dec!(100000));

    let mut first = base_event("ORD-3", 3, OrderStatus::PartiallyFilled);
    first.cumulative_qty = dec!(0.4);
    first.last_qty = dec!(0.4);
    first.average_price = dec!(45000);
    tx.send(AggregatorMessage::Event(first)).unwrap();

    let notification = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timer should have fired")
        .expect("channel open");
    assert_eq!(notification.scenario, Some(Scenario::GeneralTimeout));
    assert_eq!(notification.cumulative_quote_display.as_deref(), Some("18000.00 USDT"));

    let mut second = base_event("ORD-3", 3, OrderStatus::PartiallyFilled);
    second.cumulative_qty = dec!(0.2);
    second.last_qty = dec!(0.2);
    second.average_price = dec!(45000);
    tx.send(AggregatorMessage::Event(second)).unwrap();

    let second_notification = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("second timer should have fired")
        .expect("channel open");
    assert_eq!(second_notification.scenario, Some(Scenario::GeneralTimeout));
    assert_eq!(second_notification.cumulative_quote_display.as_deref(), Some("9000.00 USDT"));
}

#[tokio::test]
async fn scenario_4_stop_child_suppresses_parent() {
    let (tx, mut rx, _shutdown) = harness(dec!(100000));

    let mut parent = base_event("TP-TRIG", 4, OrderStatus::New);
    parent.order_type = OrderType::StopMarket;
    parent.stop_price = dec!(43000);
    tx.send(AggregatorMessage::Event(parent)).unwrap();

    let notification = rx.recv().await.expect("expected parent NEW notification");
    assert_eq!(notification.scenario, Some(Scenario::SltpNew));

    let mut child = base_event("EXEC-123", 5, OrderStatus::New);
    child.original_client_order_id = Some("TP-TRIG".to_string());
    child.order_type = OrderType::Market;
    tx.send(AggregatorMessage::Event(child)).unwrap();

    let second = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(second.is_err(), "child NEW must be dropped, got {second:?}");
}

#[tokio::test]
async fn stop_like_new_does_not_suppress_the_later_fill() {
    let (tx, mut rx, _shutdown) = harness(dec!(100000));

    let mut parent = base_event("SL-TRIG", 7, OrderStatus::New);
    parent.order_type = OrderType::StopMarket;
    parent.stop_price = dec!(43000);
    tx.send(AggregatorMessage::Event(parent)).unwrap();

    let created = rx.recv().await.expect("expected SltpNew notification");
    assert_eq!(created.scenario, Some(Scenario::SltpNew));

    let mut filled = base_event("SL-TRIG", 7, OrderStatus::Filled);
    filled.order_type = OrderType::StopMarket;
    filled.cumulative_qty = dec!(1);
    filled.last_qty = dec!(1);
    filled.average_price = dec!(43000);
    tx.send(AggregatorMessage::Event(filled)).unwrap();

    let fill = tokio::time::timeout(Duration::from_millis(300), rx.recv())
        .await
        .expect("fill within the finalized-context TTL must still be emitted")
        .expect("channel open");
    assert_eq!(fill.scenario, Some(Scenario::SltpFilled));
}

#[tokio::test]
async fn duplicate_event_within_dedup_window_emits_once() {
    let (tx, mut rx, _shutdown) = harness(dec!(100000));

    let mut e = base_event("ORD-6", 6, OrderStatus::Filled);
    e.cumulative_qty = dec!(1);
    e.last_qty = dec!(1);
    e.average_price = dec!(45000);

    tx.send(AggregatorMessage::Event(e.clone())).unwrap();
    tx.send(AggregatorMessage::Event(e)).unwrap();

    let _first = rx.recv().await.expect("expected one notification");
    let second = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(second.is_err(), "replayed event must not re-emit, got {second:?}");
}
