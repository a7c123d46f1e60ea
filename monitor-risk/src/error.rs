//! Error type for the position rule engine, alert limiter, and market
//! metrics fetcher (C7/C8/C10).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("position rules config invalid: {0}")]
    ConfigInvalid(String),

    #[error("market metrics fetch failed: {0}")]
    MarketMetrics(#[from] monitor_core::ports::PortError),
}
