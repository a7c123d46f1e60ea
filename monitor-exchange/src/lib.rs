#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]

//! # monitor-exchange
//!
//! Concrete Binance USD-M futures implementation of the "external
//! collaborator" interfaces the core depends on: signed REST
//! (account, position risk), unsigned REST (premium index, open interest,
//! Apex token info), listen-key lifecycle, and the reconnecting user-data
//! WebSocket stream.

pub mod error;
pub mod model;
pub mod rest;
pub mod signing;
pub mod stream;

pub use error::ExchangeError;
pub use rest::BinanceRestClient;
pub use stream::UserDataStream;
