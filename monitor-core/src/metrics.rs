//! C10 output type: per-symbol market metrics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SymbolMetrics {
    pub symbol: String,
    pub open_interest: Option<Decimal>,
    pub reference_price: Option<Decimal>,
    pub open_interest_notional: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub hhi: Option<Decimal>,
    pub fetched_at: DateTime<Utc>,
}

impl SymbolMetrics {
    pub fn empty(symbol: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            open_interest: None,
            reference_price: None,
            open_interest_notional: None,
            market_cap: None,
            volume_24h: None,
            hhi: None,
            fetched_at,
        }
    }
}
