//! Error type for the stateful order-aggregation pipeline (C3-C6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("account metrics fetch failed: {0}")]
    AccountMetrics(#[from] monitor_core::ports::PortError),

    #[error("notification sink rejected payload: {0}")]
    Sink(String),
}
