#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # monitor-core
//!
//! Wire-independent domain types for the futures account monitor, plus the
//! two pure/near-pure components that sit in front of the stateful
//! aggregator:
//!
//! - [`order::classify`] — C1, client-order-id convention -> [`order::classify::OrderCategory`].
//! - [`order::normalize`] — C2, raw wire JSON -> [`order::OrderEvent`].
//!
//! Everything else here (account/position snapshots, market metrics,
//! validation issues, notification payloads) is data shared between the
//! `monitor-engine` and `monitor-risk` crates and the external sinks.

pub mod account;
pub mod backoff;
pub mod decimal;
pub mod error;
pub mod metrics;
pub mod notification;
pub mod order;
pub mod ports;
pub mod validation;

pub use error::CoreError;
