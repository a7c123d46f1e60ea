#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]

//! # monitor-risk
//!
//! The periodic position-validation pipeline: C7 rule
//! engine, C8 cooldown/floor alert limiter, and C10 concurrent market
//! metrics fetcher, all driven by a [`config::PositionRulesConfig`] loaded
//! from `position-rules.json`.

pub mod config;
pub mod error;
pub mod limiter;
pub mod market_metrics;
pub mod rules;

pub use config::{AssetRule, PositionRulesConfig};
pub use error::RiskError;
pub use limiter::AlertLimiter;
pub use market_metrics::MarketMetricsProvider;
pub use monitor_core::notification::AlertEvent;
