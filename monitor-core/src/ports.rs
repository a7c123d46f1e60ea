//! Dependency-injection seams between the core engine and its "out of
//! scope" external collaborators: the stream transport, the REST
//! client, and the webhook sinks are all described here as traits so
//! `monitor-engine` and `monitor-risk` can be unit-tested against in-memory
//! stubs, with `monitor-exchange`/`monitor-service` supplying the concrete
//! Binance/HTTP implementations.

use crate::account::AccountContext;
use crate::metrics::SymbolMetrics;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;

/// Boxed, human-readable error shared by every port. Concrete collaborators
/// (REST timeouts, WS disconnects, webhook 5xx) carry richer error enums
/// internally and flatten them to this at the port boundary, mirroring
/// Section 7's principle that the core logs and continues rather than
/// propagating transport-specific failures upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortError(pub String);

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PortError {}

impl From<String> for PortError {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PortError {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Fetches the signed account snapshot (balances + position risk) consumed
/// by C4 and C9.
#[async_trait]
pub trait AccountDataSource: Send + Sync {
    async fn fetch_account(&self) -> Result<AccountContext, PortError>;
}

/// Result of C10's per-symbol market-metrics fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenInfo {
    pub market_cap: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
}

/// Unsigned market-data endpoints consumed by C10: futures
/// open interest and the apex token-info lookup.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_open_interest(&self, symbol: &str) -> Result<Decimal, PortError>;

    async fn fetch_reference_price(&self, symbol: &str) -> Result<Decimal, PortError>;

    async fn fetch_token_info(&self, base_asset: &str) -> Result<TokenInfo, PortError>;
}

/// Opaque, pre-rendered message body. Card construction (structured
/// message templating) is an external collaborator; this port
/// only knows how to ship whatever it is handed.
#[derive(Debug, Clone, PartialEq)]
pub struct CardPayload(pub serde_json::Value);

/// A chat-webhook sink.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, payload: CardPayload) -> Result<(), PortError>;
}

/// Fetches a fresh snapshot of account balances and open positions, reduced
/// to the shape [`crate::account::AccountContext`] needs.
pub type BoxAccountDataSource = std::sync::Arc<dyn AccountDataSource>;
pub type BoxMarketDataSource = std::sync::Arc<dyn MarketDataSource>;
pub type BoxNotificationSink = std::sync::Arc<dyn NotificationSink>;
