//! Account/position domain types. Populated by `monitor-exchange`'s REST client and
//! consumed by C4, C5 and C7.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum MarginType {
    Cross,
    Isolated,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Resolves direction from `positionSide` when it is LONG/SHORT,
    /// otherwise from the sign of `positionAmt`.
    pub fn resolve(position_side: crate::order::PositionSide, position_amt: Decimal) -> Self {
        use crate::order::PositionSide;
        match position_side {
            PositionSide::Long => Direction::Long,
            PositionSide::Short => Direction::Short,
            PositionSide::Both => {
                if position_amt.is_sign_negative() {
                    Direction::Short
                } else {
                    Direction::Long
                }
            }
        }
    }
}

/// One open futures position.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PositionSnapshot {
    /// Uppercase, quote-asset-stripped base asset (e.g. `BTC` for `BTCUSDT`).
    pub base_asset: String,
    pub symbol: String,
    pub position_amt: Decimal,
    pub notional: Decimal,
    pub leverage: Decimal,
    pub initial_margin: Decimal,
    pub isolated_margin: Decimal,
    pub margin_type: MarginType,
    pub direction: Direction,
    pub mark_price: Decimal,
    pub predicted_funding_rate: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl PositionSnapshot {
    /// A snapshot with zero amount and zero notional carries no information
    /// and is dropped by the caller before it reaches C7.
    pub fn is_empty(&self) -> bool {
        self.position_amt.is_zero() && self.notional.is_zero()
    }
}

/// Aggregate account context fetched each validation tick.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccountContext {
    pub total_initial_margin: Decimal,
    pub total_margin_balance: Decimal,
    pub available_balance: Decimal,
    pub snapshots: Vec<PositionSnapshot>,
    pub fetched_at: DateTime<Utc>,
}

impl AccountContext {
    /// Distinct symbols with at least one open position, for C10's fetch set.
    pub fn symbols_with_positions(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .snapshots
            .iter()
            .map(|s| s.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    /// Distinct base assets with at least one open position.
    pub fn assets_with_positions(&self) -> Vec<String> {
        let mut assets: Vec<String> = self
            .snapshots
            .iter()
            .map(|s| s.base_asset.clone())
            .collect();
        assets.sort();
        assets.dedup();
        assets
    }

    pub fn positions_for_asset(&self, asset: &str) -> Vec<&PositionSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.base_asset == asset)
            .collect()
    }

    pub fn positions_for_symbol(&self, symbol: &str) -> Vec<&PositionSnapshot> {
        self.snapshots.iter().filter(|s| s.symbol == symbol).collect()
    }
}

/// Strips the quote-asset suffix from a trading-pair symbol, e.g.
/// `BTCUSDT` -> `BTC`. Tries the common quote assets in order of
/// specificity so `BUSD` isn't mistaken for a `USD`-quoted pair.
pub fn strip_quote_asset(symbol: &str) -> String {
    const QUOTE_ASSETS: [&str; 5] = ["USDT", "BUSD", "USDC", "USD", "BTC"];
    let upper = symbol.to_uppercase();
    for quote in QUOTE_ASSETS {
        if let Some(base) = upper.strip_suffix(quote) {
            if !base.is_empty() {
                return base.to_string();
            }
        }
    }
    upper
}

/// The quote-asset suffix itself, e.g. `USDT` for `BTCUSDT` (glossary,
/// "Quote asset"). Falls back to `USDT` when the symbol doesn't carry a
/// recognized suffix, matching this exchange's dominant quote asset.
pub fn quote_asset(symbol: &str) -> String {
    const QUOTE_ASSETS: [&str; 5] = ["USDT", "BUSD", "USDC", "USD", "BTC"];
    let upper = symbol.to_uppercase();
    for quote in QUOTE_ASSETS {
        if let Some(base) = upper.strip_suffix(quote) {
            if !base.is_empty() {
                return quote.to_string();
            }
        }
    }
    "USDT".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_usdt_quote() {
        assert_eq!(strip_quote_asset("BTCUSDT"), "BTC");
    }

    #[test]
    fn strips_busd_before_generic_usd() {
        assert_eq!(strip_quote_asset("ETHBUSD"), "ETH");
    }
}
