//! C3 — order state tracker.
//!
//! In-memory map keyed by the canonical `<symbol>:<orderId>:<clientOrderId>`
//! string.
//! No background eviction: deletion is driven entirely by C5's terminal
//! transitions and timed flushes.

use monitor_core::order::classify::OrderCategory;
use monitor_core::order::OrderEvent;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One order's mutable accumulators and history.
#[derive(Debug, Clone)]
pub struct AggregationContext {
    pub cumulative_quantity: Decimal,
    pub cumulative_quote: Decimal,
    pub last_average_price: Decimal,
    pub last_status: monitor_core::order::OrderStatus,
    pub last_event_time: DateTime<Utc>,
    pub history: Vec<OrderEvent>,
    pub presentation: OrderCategory,
    pub had_partial_fill: bool,
    /// Bumped every time a deadline is (re)scheduled; a fired flush message
    /// carries the generation it was scheduled with, so a stale flush (the
    /// context since moved on) is recognized and ignored without needing a
    /// real task-cancellation handle.
    pub pending_generation: u64,
}

impl AggregationContext {
    fn new(presentation: OrderCategory) -> Self {
        Self {
            cumulative_quantity: Decimal::ZERO,
            cumulative_quote: Decimal::ZERO,
            last_average_price: Decimal::ZERO,
            last_status: monitor_core::order::OrderStatus::New,
            last_event_time: Utc::now(),
            history: Vec::new(),
            presentation,
            had_partial_fill: false,
            pending_generation: 0,
        }
    }

    /// The price cumulativeQuote is computed from for this event: avgPrice
    /// if nonzero, else lastPrice, else orderPrice.
    fn cumulative_quote_price(event: &OrderEvent) -> Decimal {
        if event.average_price > Decimal::ZERO {
            event.average_price
        } else if event.last_price > Decimal::ZERO {
            event.last_price
        } else {
            event.order_price
        }
    }

    /// Merges one event into the context: backfills averagePrice,
    /// recomputes cumulativeQuote, advances status/time, appends history
    ///.
    fn apply(&mut self, event: &OrderEvent) {
        let price = Self::cumulative_quote_price(event);
        if event.average_price > Decimal::ZERO {
            self.last_average_price = event.average_price;
        } else if event.cumulative_qty > Decimal::ZERO && price > Decimal::ZERO {
            self.last_average_price = price;
        }

        self.cumulative_quantity = event.cumulative_qty.max(self.cumulative_quantity);
        self.cumulative_quote = price * self.cumulative_quantity;
        self.last_status = event.status;
        self.last_event_time = event.event_time;
        if event.status == monitor_core::order::OrderStatus::PartiallyFilled {
            self.had_partial_fill = true;
        }
        self.history.push(event.clone());
    }
}

/// C3's in-memory map.
#[derive(Debug, Default)]
pub struct OrderStateTracker {
    contexts: HashMap<String, AggregationContext>,
}

impl OrderStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts the context for `event`'s identity, stamping `presentation`
    /// only on first insertion, and returns a clone of the context after the
    /// merge.
    pub fn update(
        &mut self,
        key: &str,
        event: &OrderEvent,
        presentation: OrderCategory,
    ) -> AggregationContext {
        let ctx = self
            .contexts
            .entry(key.to_string())
            .or_insert_with(|| AggregationContext::new(presentation));
        ctx.apply(event);
        ctx.clone()
    }

    pub fn get(&self, key: &str) -> Option<&AggregationContext> {
        self.contexts.get(key)
    }

    /// Overwrites the stored context, used by C5 when bumping the pending
    /// timer generation.
    pub fn set_context(&mut self, key: &str, ctx: AggregationContext) {
        self.contexts.insert(key.to_string(), ctx);
    }

    pub fn delete(&mut self, key: &str) -> Option<AggregationContext> {
        self.contexts.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::order::classify::{Kind, Source};
    use monitor_core::order::{OrderIdentity, OrderStatus, OrderType, PositionSide, Side};
    use rust_decimal_macros::dec;

    fn category() -> OrderCategory {
        OrderCategory {
            kind: Kind::Other,
            level: None,
            time_frame: None,
            source: Source::Other,
            title_suffix: "其他".to_string(),
        }
    }

    fn event(status: OrderStatus, cum_qty: Decimal, avg: Decimal) -> OrderEvent {
        OrderEvent {
            identity: OrderIdentity {
                symbol: "BTCUSDT".to_string(),
                order_id: 1,
                client_order_id: "ORD-1".to_string(),
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
            cumulative_qty: cum_qty,
            last_qty: cum_qty,
            average_price: avg,
            last_price: Decimal::ZERO,
            order_price: dec!(45000),
            stop_price: Decimal::ZERO,
            activation_price: None,
            callback_rate: None,
            realized_pnl: None,
        }
    }

    #[test]
    fn recomputes_cumulative_quote_from_avg_price() {
        let mut tracker = OrderStateTracker::new();
        let ctx = tracker.update("k", &event(OrderStatus::Filled, dec!(1), dec!(45000)), category());
        assert_eq!(ctx.cumulative_quote, dec!(45000));
    }

    #[test]
    fn backfills_average_price_when_zero() {
        let mut tracker = OrderStateTracker::new();
        let mut e = event(OrderStatus::Filled, dec!(1), Decimal::ZERO);
        e.last_price = dec!(45100);
        let ctx = tracker.update("k", &e, category());
        assert_eq!(ctx.last_average_price, dec!(45100));
        assert_eq!(ctx.cumulative_quote, dec!(45100));
    }

    #[test]
    fn tracks_partial_fill_flag_across_updates() {
        let mut tracker = OrderStateTracker::new();
        tracker.update("k", &event(OrderStatus::PartiallyFilled, dec!(0.5), dec!(45000)), category());
        let ctx = tracker.update("k", &event(OrderStatus::Filled, dec!(1), dec!(45000)), category());
        assert!(ctx.had_partial_fill);
    }
}
