//! C2 — event normalizer.
//!
//! Validates a raw `ORDER_TRADE_UPDATE` wire message and projects it into a
//! typed [`OrderEvent`]. Invalid messages are rejected silently — the
//! normalizer returns `None` and logs at debug, per Section 7 ("Unknown
//! event schema... drop silently").

use super::{OrderEvent, OrderIdentity, OrderStatus, OrderType, PositionSide, Side};
use crate::decimal::parse_opt;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Raw wire envelope: `{ e, E, T, o: {...} }`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrderTradeUpdate {
    pub e: String,
    #[serde(default)]
    pub E: i64,
    #[serde(default)]
    pub T: i64,
    pub o: RawOrder,
}

/// Raw per-order payload using the exchange's single-letter field names.
#[derive(Debug, Clone, Deserialize)]
#[allow(non_snake_case)]
pub struct RawOrder {
    pub s: String,
    pub c: String,
    #[serde(default, rename = "C")]
    pub C: Option<String>,
    pub S: String,
    #[serde(default)]
    pub ps: Option<String>,
    pub o: String,
    pub x: String,
    pub X: String,
    pub i: u64,
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub z: String,
    #[serde(default)]
    pub l: String,
    #[serde(default)]
    pub ap: String,
    #[serde(default, rename = "L")]
    pub L: String,
    #[serde(default)]
    pub p: String,
    #[serde(default)]
    pub sp: String,
    #[serde(default, rename = "AP")]
    pub AP: Option<String>,
    #[serde(default)]
    pub cr: Option<String>,
    #[serde(default)]
    pub rp: Option<String>,
    #[serde(default)]
    pub m: bool,
    #[serde(default)]
    pub T: i64,
}

fn epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn parse_status(raw: &str) -> Option<OrderStatus> {
    Some(match raw {
        "NEW" => OrderStatus::New,
        "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
        "FILLED" => OrderStatus::Filled,
        "CANCELED" => OrderStatus::Canceled,
        // EXPIRED_IN_MATCH normalizes to EXPIRED; the raw value
        // survives on `exec_type` for C6's expiry-reason derivation.
        "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Expired,
        "PENDING_CANCEL" => OrderStatus::PendingCancel,
        "REJECTED" => OrderStatus::Rejected,
        _ => return None,
    })
}

fn parse_side(raw: &str) -> Option<Side> {
    match raw {
        "BUY" => Some(Side::Buy),
        "SELL" => Some(Side::Sell),
        _ => None,
    }
}

fn parse_position_side(raw: Option<&str>) -> PositionSide {
    match raw {
        Some("LONG") => PositionSide::Long,
        Some("SHORT") => PositionSide::Short,
        _ => PositionSide::Both,
    }
}

/// Validates and projects a raw wire message into an [`OrderEvent`].
///
/// Returns `None` (and lets the caller log) when a required field is
/// missing or structurally invalid: unknown `e` discriminant, unparsable
/// status/side, or an unrepresentable event timestamp.
pub fn normalize(raw: &RawOrderTradeUpdate) -> Option<OrderEvent> {
    if raw.e != "ORDER_TRADE_UPDATE" {
        return None;
    }

    let status = parse_status(&raw.o.X)?;
    let side = parse_side(&raw.o.S)?;
    let event_time = epoch_ms(raw.E)?;
    let trade_time = epoch_ms(raw.o.T).unwrap_or(event_time);

    let original_qty = parse_opt(&raw.o.q).unwrap_or_default();
    let cumulative_qty = parse_opt(&raw.o.z).unwrap_or_default();
    let last_qty = parse_opt(&raw.o.l).unwrap_or_default();
    let average_price = parse_opt(&raw.o.ap).unwrap_or_default();
    let last_price = parse_opt(&raw.o.L).unwrap_or_default();
    let order_price = parse_opt(&raw.o.p).unwrap_or_default();
    let stop_price = parse_opt(&raw.o.sp).unwrap_or_default();
    let activation_price = raw.o.AP.as_deref().and_then(parse_opt);
    let callback_rate = raw.o.cr.as_deref().and_then(parse_opt);

    // Realized-PnL parse failure: treat as 0 for aggregation but keep the
    // distinction (None) visible to the caller for debug logging
    //.
    let realized_pnl = raw.o.rp.as_deref().map(|s| parse_opt(s).unwrap_or_default());

    Some(OrderEvent {
        identity: OrderIdentity {
            symbol: raw.o.s.clone(),
            order_id: raw.o.i,
            client_order_id: raw.o.c.clone(),
        },
        original_client_order_id: raw.o.C.clone().filter(|s| !s.is_empty()),
        status,
        side,
        position_side: parse_position_side(raw.o.ps.as_deref()),
        order_type: order_type_from_wire(&raw.o.o),
        exec_type: raw.o.x.clone(),
        is_maker: raw.o.m,
        event_time,
        trade_time,
        original_qty,
        cumulative_qty,
        last_qty,
        average_price,
        last_price,
        order_price,
        stop_price,
        activation_price,
        callback_rate,
        realized_pnl,
    })
}

fn order_type_from_wire(raw: &str) -> OrderType {
    match raw {
        "MARKET" => OrderType::Market,
        "LIMIT" => OrderType::Limit,
        "STOP_MARKET" => OrderType::StopMarket,
        "TAKE_PROFIT_MARKET" => OrderType::TakeProfitMarket,
        "TRAILING_STOP_MARKET" => OrderType::TrailingStopMarket,
        "STOP" => OrderType::Stop,
        "TAKE_PROFIT" => OrderType::TakeProfit,
        other => OrderType::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "e": "ORDER_TRADE_UPDATE",
            "E": 1_700_000_000_000i64,
            "T": 1_700_000_000_100i64,
            "o": {
                "s": "BTCUSDT",
                "c": "ORD-1",
                "S": "BUY",
                "ps": "BOTH",
                "o": "LIMIT",
                "x": "TRADE",
                "X": "FILLED",
                "i": 555,
                "q": "1",
                "z": "1",
                "l": "1",
                "ap": "45000",
                "L": "45000",
                "p": "45000",
                "sp": "0",
                "m": false,
                "T": 1_700_000_000_100i64,
                "rp": "0"
            }
        })
    }

    #[test]
    fn normalizes_well_formed_message() {
        let raw: RawOrderTradeUpdate = serde_json::from_value(sample_json()).unwrap();
        let event = normalize(&raw).expect("should normalize");
        assert_eq!(event.identity.symbol, "BTCUSDT");
        assert_eq!(event.status, OrderStatus::Filled);
        assert_eq!(event.side, Side::Buy);
    }

    #[test]
    fn rejects_unknown_event_type() {
        let mut json = sample_json();
        json["e"] = serde_json::Value::String("ACCOUNT_UPDATE".to_string());
        let raw: RawOrderTradeUpdate = serde_json::from_value(json).unwrap();
        assert!(normalize(&raw).is_none());
    }

    #[test]
    fn rejects_unknown_status() {
        let mut json = sample_json();
        json["o"]["X"] = serde_json::Value::String("WAT".to_string());
        let raw: RawOrderTradeUpdate = serde_json::from_value(json).unwrap();
        assert!(normalize(&raw).is_none());
    }

    #[test]
    fn normalizes_expired_in_match_to_expired() {
        let mut json = sample_json();
        json["o"]["X"] = serde_json::Value::String("EXPIRED_IN_MATCH".to_string());
        json["o"]["x"] = serde_json::Value::String("EXPIRED_IN_MATCH".to_string());
        let raw: RawOrderTradeUpdate = serde_json::from_value(json).unwrap();
        let event = normalize(&raw).unwrap();
        assert_eq!(event.status, OrderStatus::Expired);
        assert_eq!(event.exec_type, "EXPIRED_IN_MATCH");
    }

    #[test]
    fn missing_rp_is_none_not_zero() {
        let mut json = sample_json();
        json["o"].as_object_mut().unwrap().remove("rp");
        let raw: RawOrderTradeUpdate = serde_json::from_value(json).unwrap();
        let event = normalize(&raw).unwrap();
        assert_eq!(event.realized_pnl, None);
    }

    #[test]
    fn garbage_rp_is_treated_as_zero_delta() {
        let mut json = sample_json();
        json["o"]["rp"] = serde_json::Value::String("garbage".to_string());
        let raw: RawOrderTradeUpdate = serde_json::from_value(json).unwrap();
        let event = normalize(&raw).unwrap();
        assert_eq!(event.realized_pnl, Some(rust_decimal::Decimal::ZERO));
    }
}
