//! C10 — concurrent, TTL-cached per-symbol market metrics fetcher
//!.
//!
//! Each `(symbol, field)` observation is cached independently so a
//! transient open-interest failure doesn't evict a still-fresh
//! token-info result. Concurrency across symbols is bounded by a
//! semaphore-gated worker pool (default 5).

use monitor_core::metrics::SymbolMetrics;
use monitor_core::ports::{BoxMarketDataSource, TokenInfo};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};

const DEFAULT_TTL: Duration = Duration::from_secs(180);
const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Default)]
struct CachedFields {
    open_interest: Option<(Decimal, Instant)>,
    reference_price: Option<(Decimal, Instant)>,
    token_info: Option<(TokenInfo, Instant)>,
}

fn fresh<T: Clone>(entry: &Option<(T, Instant)>, ttl: Duration) -> Option<T> {
    entry
        .as_ref()
        .filter(|(_, at)| at.elapsed() < ttl)
        .map(|(value, _)| value.clone())
}

/// Bounded-concurrency, TTL-cached market metrics source for C7.
pub struct MarketMetricsProvider {
    source: BoxMarketDataSource,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedFields>>,
    gate: Arc<Semaphore>,
}

impl std::fmt::Debug for MarketMetricsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketMetricsProvider")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl MarketMetricsProvider {
    pub fn new(source: BoxMarketDataSource, ttl: Duration, concurrency: usize) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(HashMap::new()),
            gate: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn with_defaults(source: BoxMarketDataSource) -> Self {
        Self::new(source, DEFAULT_TTL, DEFAULT_CONCURRENCY)
    }

    /// Fetches (cache-first) metrics for every symbol, returning a map
    /// keyed by symbol. Per-endpoint failures log at warn and leave that
    /// field nil rather than failing the whole symbol.
    pub async fn fetch_for_symbols(&self, symbols: &[String]) -> HashMap<String, SymbolMetrics> {
        let mut handles = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let symbol = symbol.clone();
            let gate = Arc::clone(&self.gate);
            handles.push(async move {
                let _permit = gate.acquire_owned().await.expect("semaphore never closed");
                let fields = self.fields_for(&symbol).await;
                (symbol, fields)
            });
        }

        let results = futures::future::join_all(handles).await;
        results.into_iter().collect()
    }

    async fn fields_for(&self, symbol: &str) -> SymbolMetrics {
        let now = Instant::now();
        let cached = {
            let cache = self.cache.lock().await;
            cache.get(symbol).cloned().unwrap_or_default()
        };

        let open_interest = match fresh(&cached.open_interest, self.ttl) {
            Some(value) => Some(value),
            None => self.refresh_open_interest(symbol).await,
        };
        let reference_price = match fresh(&cached.reference_price, self.ttl) {
            Some(value) => Some(value),
            None => self.refresh_reference_price(symbol).await,
        };
        let token_info = match fresh(&cached.token_info, self.ttl) {
            Some(value) => Some(value),
            None => self.refresh_token_info(symbol).await,
        };

        let open_interest_notional = match (open_interest, reference_price) {
            (Some(oi), Some(price)) => Some(oi * price),
            _ => None,
        };

        SymbolMetrics {
            symbol: symbol.to_string(),
            open_interest,
            reference_price,
            open_interest_notional,
            market_cap: token_info.as_ref().and_then(|t| t.market_cap),
            volume_24h: token_info.as_ref().and_then(|t| t.volume_24h),
            hhi: None,
            fetched_at: now_utc(),
        }
    }

    async fn refresh_open_interest(&self, symbol: &str) -> Option<Decimal> {
        match self.source.fetch_open_interest(symbol).await {
            Ok(value) => {
                self.store(symbol, |fields| fields.open_interest = Some((value, Instant::now())))
                    .await;
                Some(value)
            }
            Err(err) => {
                tracing::warn!(symbol, error = %err, "open interest fetch failed");
                None
            }
        }
    }

    async fn refresh_reference_price(&self, symbol: &str) -> Option<Decimal> {
        match self.source.fetch_reference_price(symbol).await {
            Ok(value) => {
                self.store(symbol, |fields| fields.reference_price = Some((value, Instant::now())))
                    .await;
                Some(value)
            }
            Err(err) => {
                tracing::warn!(symbol, error = %err, "reference price fetch failed");
                None
            }
        }
    }

    async fn refresh_token_info(&self, symbol: &str) -> Option<TokenInfo> {
        let base_asset = monitor_core::account::strip_quote_asset(symbol);
        match self.source.fetch_token_info(&base_asset).await {
            Ok(info) => {
                self.store(symbol, |fields| fields.token_info = Some((info.clone(), Instant::now())))
                    .await;
                Some(info)
            }
            Err(err) => {
                tracing::warn!(symbol, base_asset, error = %err, "token info fetch failed");
                None
            }
        }
    }

    async fn store(&self, symbol: &str, mutate: impl FnOnce(&mut CachedFields)) {
        let mut cache = self.cache.lock().await;
        let entry = cache.entry(symbol.to_string()).or_default();
        mutate(entry);
    }
}

fn now_utc() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use monitor_core::ports::{MarketDataSource, PortError};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataSource for CountingSource {
        async fn fetch_open_interest(&self, _symbol: &str) -> Result<Decimal, PortError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(dec!(1000))
        }

        async fn fetch_reference_price(&self, _symbol: &str) -> Result<Decimal, PortError> {
            Ok(dec!(10))
        }

        async fn fetch_token_info(&self, _base_asset: &str) -> Result<TokenInfo, PortError> {
            Ok(TokenInfo {
                market_cap: Some(dec!(1_000_000)),
                volume_24h: Some(dec!(500_000)),
            })
        }
    }

    #[tokio::test]
    async fn computes_open_interest_notional_and_caches_subsequent_calls() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let provider = MarketMetricsProvider::new(source.clone(), Duration::from_secs(60), 2);

        let symbols = vec!["BTCUSDT".to_string()];
        let first = provider.fetch_for_symbols(&symbols).await;
        assert_eq!(first["BTCUSDT"].open_interest_notional, Some(dec!(10000)));

        provider.fetch_for_symbols(&symbols).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
