//! C5 — order aggregator, the core state machine.
//!
//! Owns the only mutable state in the pipeline and is driven by a single
//! serial message loop. A
//! pending time-window deadline is represented as a generation counter on
//! the context plus a spawned task that re-enqueues a `Flush` message on
//! the same channel it is itself drained from — the event-processing loop
//! stays the sole mutator, so no context ever needs a lock.

use crate::account_metrics::AccountMetricsProvider;
use crate::dedup::TtlSet;
use crate::dispatcher::expiry_reason;
use crate::tracker::{AggregationContext, OrderStateTracker};
use monitor_core::account::quote_asset;
use monitor_core::decimal::{format_notional, format_percent, format_price_8dp, format_signed_notional};
use monitor_core::notification::{OrderNotification, PriceSource, Scenario};
use monitor_core::order::classify::{classify, OrderCategory, Source};
use monitor_core::order::{OrderEvent, OrderStatus, OrderType};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const EVENT_DEDUP_TTL: Duration = Duration::from_secs(60);
const FINALIZED_CONTEXT_TTL: Duration = Duration::from_secs(60);

/// Message processed by the aggregator's single serial loop: a real wire
/// event, or a synthetic flush fired by an expired window timer.
#[derive(Debug)]
pub enum AggregatorMessage {
    Event(OrderEvent),
    Flush {
        key: String,
        generation: u64,
        scenario: Scenario,
    },
}

fn presentation_cache_key(symbol: &str, client_order_id: &str) -> String {
    format!("{symbol}:{client_order_id}")
}

fn parent_suppression_key(symbol: &str, client_order_id: &str) -> String {
    format!("{symbol}:{client_order_id}")
}

pub struct OrderAggregator {
    tracker: OrderStateTracker,
    account_metrics: Arc<AccountMetricsProvider>,
    event_dedup: TtlSet,
    finalized_contexts: TtlSet,
    suppressed_parents: HashSet<String>,
    presentation_cache: std::collections::HashMap<String, OrderCategory>,
    window: Duration,
    self_tx: mpsc::UnboundedSender<AggregatorMessage>,
    notify_tx: mpsc::UnboundedSender<OrderNotification>,
}

impl std::fmt::Debug for OrderAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderAggregator")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl OrderAggregator {
    pub fn new(
        account_metrics: Arc<AccountMetricsProvider>,
        window: Duration,
        self_tx: mpsc::UnboundedSender<AggregatorMessage>,
        notify_tx: mpsc::UnboundedSender<OrderNotification>,
    ) -> Self {
        Self {
            tracker: OrderStateTracker::new(),
            account_metrics,
            event_dedup: TtlSet::new(EVENT_DEDUP_TTL),
            finalized_contexts: TtlSet::new(FINALIZED_CONTEXT_TTL),
            suppressed_parents: HashSet::new(),
            presentation_cache: std::collections::HashMap::new(),
            window,
            self_tx,
            notify_tx,
        }
    }

    /// Drains `inbox` until `shutdown` fires. Real events and timer flushes interleave
    /// on the same channel so they never run concurrently. The channel
    /// itself never closes on its own — `self_tx` keeps a live sender for
    /// as long as this worker runs, and every pending flush timer holds a
    /// clone — so `shutdown` is the only way this loop ends; once it does,
    /// `self` and its `notify_tx` drop, which in turn closes C6's inbox.
    pub async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<AggregatorMessage>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                message = inbox.recv() => {
                    match message {
                        Some(AggregatorMessage::Event(event)) => self.handle_event(event).await,
                        Some(AggregatorMessage::Flush { key, generation, scenario }) => {
                            self.handle_flush(key, generation, scenario).await
                        }
                        None => return,
                    }
                }
            }
        }
    }

    /// Presentation resolution with parent inheritance:
    /// an order's own classification wins whenever it is recognizable; a
    /// child execution whose own clientOrderId is unrecognizable inherits
    /// its parent's cached presentation, but only once it has left NEW —
    /// otherwise `TW_`-nested NEW-drop at the routing step below would
    /// never fire for the child and scenario 4 would double-emit.
    fn resolve_presentation(&mut self, event: &OrderEvent) -> OrderCategory {
        let own = classify(&event.identity.client_order_id);
        if own.kind != monitor_core::order::classify::Kind::Other {
            let key = presentation_cache_key(&event.identity.symbol, &event.identity.client_order_id);
            self.presentation_cache.entry(key).or_insert_with(|| own.clone());
            return own;
        }

        if event.is_child_execution() && event.status != OrderStatus::New {
            let parent_id = event.original_client_order_id.as_deref().unwrap_or_default();
            let key = presentation_cache_key(&event.identity.symbol, parent_id);
            if let Some(inherited) = self.presentation_cache.get(&key) {
                return inherited.clone();
            }
        }

        own
    }

    async fn handle_event(&mut self, event: OrderEvent) {
        let dedup_key = event.dedup_key();
        if self.event_dedup.contains(&dedup_key) {
            debug!(key = %dedup_key, "dropping duplicate event");
            return;
        }

        let presentation = self.resolve_presentation(&event);
        let key = event.identity.tracker_key();

        if presentation.source == Source::Other && event.status == OrderStatus::New {
            self.event_dedup.insert(dedup_key);
            debug!(id = %event.identity, "dropping unclassified NEW event");
            return;
        }

        if event.status.is_terminal() && self.finalized_contexts.contains(&key) {
            self.event_dedup.insert(dedup_key);
            debug!(id = %event.identity, "dropping event for already-finalized context");
            return;
        }

        self.event_dedup.insert(dedup_key);

        // EXPIRED (and other statuses outside C5's closed scenario set —
        // Section 4.5.3's tables cover only NEW/PARTIALLY_FILLED/FILLED/
        // CANCELED) never produce a scenario emission; instead build a
        // life-cycle notification directly, carrying the expiry-reason
        // string C6 otherwise derives.
        if !matches!(
            event.status,
            OrderStatus::New | OrderStatus::PartiallyFilled | OrderStatus::Filled | OrderStatus::Canceled
        ) {
            self.tracker.delete(&key);
            self.finalized_contexts.insert(key);
            if event.status == OrderStatus::Expired {
                self.emit_expiry_notification(&event, &presentation);
            }
            return;
        }

        let suppression_key =
            parent_suppression_key(&event.identity.symbol, &event.identity.client_order_id);
        if event.status == OrderStatus::Filled && self.suppressed_parents.contains(&suppression_key) {
            self.tracker.delete(&key);
            self.finalized_contexts.insert(key);
            debug!(id = %event.identity, "dropping suppressed parent fill, child already announced");
            return;
        }

        if event.is_child_execution() {
            let parent_key = parent_suppression_key(
                &event.identity.symbol,
                event.original_client_order_id.as_deref().unwrap_or_default(),
            );
            self.suppressed_parents.insert(parent_key);
        }

        let had_partial_before = self
            .tracker
            .get(&key)
            .map(|ctx| ctx.had_partial_fill)
            .unwrap_or(false);
        let ctx = self.tracker.update(&key, &event, presentation.clone());

        if presentation.is_stop_like() {
            self.handle_stop_like(event, key, ctx, had_partial_before).await;
        } else {
            self.handle_general(event, key, ctx, had_partial_before).await;
        }
    }

    async fn handle_stop_like(
        &mut self,
        event: OrderEvent,
        key: String,
        ctx: AggregationContext,
        had_partial_before: bool,
    ) {
        match event.status {
            OrderStatus::New => {
                if !event.order_type.is_market_or_limit() {
                    // SltpNew is a life-cycle event only: the order is still
                    // live, so the context must survive for the FILLED/
                    // CANCELED emission still to come. Destroying it here
                    // (and finalizing the key) would drop that later
                    // terminal event whenever it lands within the 60 s
                    // finalized-context TTL.
                    self.emit_notification(&event, &ctx, Scenario::SltpNew).await;
                }
            }
            OrderStatus::PartiallyFilled => {
                self.schedule_timer(&key, Scenario::SltpPartialTimeout);
            }
            OrderStatus::Filled => {
                let scenario = if had_partial_before {
                    Scenario::SltpPartialCompleted
                } else {
                    Scenario::SltpFilled
                };
                self.emit_and_destroy(&event, &ctx, scenario, &key).await;
            }
            OrderStatus::Canceled => {
                let scenario = if had_partial_before {
                    Scenario::SltpPartialCanceled
                } else {
                    Scenario::SltpCanceled
                };
                self.emit_and_destroy(&event, &ctx, scenario, &key).await;
            }
            _ => {}
        }
    }

    async fn handle_general(
        &mut self,
        event: OrderEvent,
        key: String,
        ctx: AggregationContext,
        had_partial_before: bool,
    ) {
        match event.status {
            OrderStatus::PartiallyFilled => {
                self.schedule_timer(&key, Scenario::GeneralTimeout);
            }
            OrderStatus::Filled => {
                let scenario = if had_partial_before {
                    Scenario::GeneralAggregated
                } else {
                    Scenario::GeneralSingle
                };
                self.emit_and_destroy(&event, &ctx, scenario, &key).await;
            }
            OrderStatus::Canceled => {
                if had_partial_before {
                    self.emit_and_destroy(&event, &ctx, Scenario::GeneralPartialCanceled, &key)
                        .await;
                } else {
                    self.tracker.delete(&key);
                    self.finalized_contexts.insert(key);
                }
            }
            _ => {}
        }
    }

    /// Schedules (or reschedules) the single-shot window deadline for
    /// `key`. Bumping `pending_generation` invalidates any
    /// previously spawned flush without needing real task cancellation.
    fn schedule_timer(&mut self, key: &str, scenario: Scenario) {
        let Some(ctx) = self.tracker.get(key) else {
            return;
        };
        let mut ctx = ctx.clone();
        ctx.pending_generation += 1;
        let generation = ctx.pending_generation;
        self.tracker.set_context(key, ctx);

        let tx = self.self_tx.clone();
        let window = self.window;
        let key_owned = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = tx.send(AggregatorMessage::Flush {
                key: key_owned,
                generation,
                scenario,
            });
        });
    }

    async fn handle_flush(&mut self, key: String, generation: u64, scenario: Scenario) {
        let is_current = matches!(
            self.tracker.get(&key),
            Some(ctx) if ctx.pending_generation == generation
        );
        if !is_current {
            return;
        }

        let Some(ctx) = self.tracker.delete(&key) else {
            return;
        };
        let Some(last_event) = ctx.history.last().cloned() else {
            return;
        };
        self.emit_notification(&last_event, &ctx, scenario).await;
    }

    async fn emit_and_destroy(
        &mut self,
        event: &OrderEvent,
        ctx: &AggregationContext,
        scenario: Scenario,
        key: &str,
    ) {
        self.emit_notification(event, ctx, scenario).await;
        self.tracker.delete(key);
        self.finalized_contexts.insert(key.to_string());
    }

    async fn emit_notification(&self, event: &OrderEvent, ctx: &AggregationContext, scenario: Scenario) {
        let display_price = select_display_price(scenario, event, &ctx.last_average_price);
        let quote = quote_asset(&event.identity.symbol);

        let mut cumulative_quote_display = None;
        let mut cumulative_quote_ratio_display = None;
        let mut trade_pnl_display = None;
        let mut long_short_ratio_display = None;
        let mut long_short_ratio_raw = None;

        if scenario.includes_cumulative()
            && ctx.cumulative_quantity > Decimal::ZERO
            && ctx.cumulative_quote > Decimal::ZERO
        {
            cumulative_quote_display =
                Some(format!("{} {}", format_notional(ctx.cumulative_quote), quote));

            let summary = self.account_metrics.get_summary().await;

            if let Some(summary) = &summary {
                if summary.total_funds > Decimal::ZERO {
                    cumulative_quote_ratio_display =
                        Some(format_percent(ctx.cumulative_quote / summary.total_funds));
                }
            }

            let pnl_sum: Decimal = ctx.history.iter().filter_map(|e| e.realized_pnl).sum();
            trade_pnl_display = Some(format!("{} {}", format_signed_notional(pnl_sum), quote));

            if scenario.state_label().contains('成') {
                if let Some(summary) = &summary {
                    let (display, raw) = long_short_ratio(summary.long_notional, summary.short_notional);
                    long_short_ratio_display = display;
                    long_short_ratio_raw = raw;
                }
            }
        }

        let title = format!("{}-{}", event.identity.symbol, ctx.presentation.title_suffix);

        let notification = OrderNotification {
            scenario: Some(scenario),
            symbol: event.identity.symbol.clone(),
            order_id: event.identity.order_id,
            client_order_id: event.identity.client_order_id.clone(),
            source: ctx.presentation.source,
            title,
            state_label: scenario.state_label().to_string(),
            display_price,
            cumulative_quote_display,
            cumulative_quote_ratio_display,
            trade_pnl_display,
            long_short_ratio_display,
            long_short_ratio_raw,
            expiry_reason: None,
            emitted_at: chrono::Utc::now(),
        };

        let _ = self.notify_tx.send(notification);
    }

    /// Builds a life-cycle notification straight from an `EXPIRED` event,
    /// bypassing the scenario state machine entirely.
    fn emit_expiry_notification(&self, event: &OrderEvent, presentation: &OrderCategory) {
        let notification = OrderNotification {
            scenario: None,
            symbol: event.identity.symbol.clone(),
            order_id: event.identity.order_id,
            client_order_id: event.identity.client_order_id.clone(),
            source: presentation.source,
            title: format!("{}-{}", event.identity.symbol, presentation.title_suffix),
            state_label: "过期".to_string(),
            display_price: format_price_8dp(event.order_price),
            cumulative_quote_display: None,
            cumulative_quote_ratio_display: None,
            trade_pnl_display: None,
            long_short_ratio_display: None,
            long_short_ratio_raw: None,
            expiry_reason: Some(expiry_reason(&event.exec_type)),
            emitted_at: chrono::Utc::now(),
        };
        let _ = self.notify_tx.send(notification);
    }
}

/// Section 4.5.6: long/short notional ratio, only meaningful when the
/// scenario's state label includes 成交 (a fill).
fn long_short_ratio(long_notional: Decimal, short_notional: Decimal) -> (Option<String>, Option<String>) {
    if long_notional.is_zero() && short_notional.is_zero() {
        return (None, None);
    }
    if short_notional.is_zero() {
        return (Some("∞:1.00".to_string()), Some("Infinity:1".to_string()));
    }
    let ratio = long_notional / short_notional;
    let display = format!("{:.2}:1.00", ratio);
    (Some(display.clone()), Some(display))
}

/// Section 4.5.5: resolves which priceSource to use, then walks its
/// fallback chain. `orderType == MARKET` always forces the `average` chain
/// regardless of what the scenario nominally prefers.
fn select_display_price(scenario: Scenario, event: &OrderEvent, ctx_last_avg: &Decimal) -> String {
    let source = if event.order_type == OrderType::Market {
        PriceSource::Average
    } else {
        scenario.price_source()
    };

    let price = match source {
        PriceSource::Average => {
            if event.average_price > Decimal::ZERO {
                event.average_price
            } else if *ctx_last_avg > Decimal::ZERO {
                *ctx_last_avg
            } else if event.last_price > Decimal::ZERO {
                event.last_price
            } else if event.order_price > Decimal::ZERO {
                event.order_price
            } else {
                event.stop_price
            }
        }
        PriceSource::Order => {
            if event.order_price > Decimal::ZERO {
                event.order_price
            } else if event.stop_price > Decimal::ZERO {
                event.stop_price
            } else if event.average_price > Decimal::ZERO {
                event.average_price
            } else {
                event.last_price
            }
        }
    };

    format_price_8dp(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_short_ratio_omits_when_both_zero() {
        assert_eq!(long_short_ratio(Decimal::ZERO, Decimal::ZERO), (None, None));
    }

    #[test]
    fn long_short_ratio_is_infinite_when_only_long() {
        let (display, raw) = long_short_ratio(Decimal::from(100), Decimal::ZERO);
        assert_eq!(display.as_deref(), Some("∞:1.00"));
        assert_eq!(raw.as_deref(), Some("Infinity:1"));
    }

    #[test]
    fn long_short_ratio_divides_when_both_present() {
        let (display, _) = long_short_ratio(Decimal::from(200), Decimal::from(100));
        assert_eq!(display.as_deref(), Some("2.00:1.00"));
    }
}
