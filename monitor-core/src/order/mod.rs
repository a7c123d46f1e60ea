//! Order domain types: the wire-independent [`OrderEvent`] projection and
//! its constituent enums.

pub mod classify;
pub mod normalize;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order lifecycle status, normalized from the exchange's wire values.
///
/// `EXPIRED_IN_MATCH` is folded into [`OrderStatus::Expired`] on normalization
///; the original wire value is retained on [`OrderEvent::exec_type`]
/// so the notification dispatcher can still distinguish the expiry reason
///.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Expired,
    PendingCancel,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::Rejected
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum PositionSide {
    Long,
    Short,
    Both,
}

/// Order type as reported by the exchange (`o` wire field). Only the
/// variants the core branches on are enumerated; anything else is carried
/// as [`OrderType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    TakeProfitMarket,
    TrailingStopMarket,
    Stop,
    TakeProfit,
    Other(String),
}

impl OrderType {
    pub fn is_market_or_limit(&self) -> bool {
        matches!(self, OrderType::Market | OrderType::Limit)
    }
}

/// Identity tuple of an order: `(symbol, orderId, clientOrderId)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[display("{symbol}:{order_id}:{client_order_id}")]
pub struct OrderIdentity {
    pub symbol: String,
    pub order_id: u64,
    pub client_order_id: String,
}

impl OrderIdentity {
    /// Canonical `<symbol>:<orderId>:<clientOrderId>` composite key.
    pub fn tracker_key(&self) -> String {
        format!("{}:{}:{}", self.symbol, self.order_id, self.client_order_id)
    }
}

/// Immutable projection of one `ORDER_TRADE_UPDATE` wire message
///. Produced exclusively by [`normalize::normalize`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderEvent {
    pub identity: OrderIdentity,
    pub original_client_order_id: Option<String>,
    pub status: OrderStatus,
    pub side: Side,
    pub position_side: PositionSide,
    pub order_type: OrderType,
    /// Raw wire execution-type string (`x`), preserved for expiry-reason
    /// derivation and dedup keying.
    pub exec_type: String,
    pub is_maker: bool,
    pub event_time: DateTime<Utc>,
    pub trade_time: DateTime<Utc>,

    pub original_qty: Decimal,
    pub cumulative_qty: Decimal,
    pub last_qty: Decimal,
    pub average_price: Decimal,
    pub last_price: Decimal,
    pub order_price: Decimal,
    pub stop_price: Decimal,
    pub activation_price: Option<Decimal>,
    pub callback_rate: Option<Decimal>,

    /// Per-event realized PnL delta (`rp`); `None` when the field failed to
    /// parse.
    pub realized_pnl: Option<Decimal>,
}

impl OrderEvent {
    /// Dedup key per Section 4.5: identifies a logical retransmission.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{:?}|{}|{}|{}|{}",
            self.identity.symbol,
            self.identity.order_id,
            self.identity.client_order_id,
            self.status,
            self.exec_type,
            self.trade_time.timestamp_millis(),
            self.last_qty,
            self.cumulative_qty,
        )
    }

    /// `true` when this event belongs to a child execution order spawned by
    /// a triggered stop/take-profit parent.
    pub fn is_child_execution(&self) -> bool {
        self.original_client_order_id
            .as_deref()
            .is_some_and(|parent| parent != self.identity.client_order_id)
    }
}
