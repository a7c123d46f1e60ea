//! C4 — account metrics provider.
//!
//! Single-flight, short-TTL cached summary of account balances and open
//! positions, shared by C5 (cumulative-quote ratio, long/short ratio) and
//! C9.

use chrono::{DateTime, Utc};
use monitor_core::account::{AccountContext, Direction};
use monitor_core::ports::BoxAccountDataSource;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Reduced account snapshot C4 hands out.
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub total_funds: Decimal,
    pub fetched_at: DateTime<Utc>,
    /// Keyed by `<symbol>:<direction>`.
    pub positions_by_key: HashMap<String, Decimal>,
    pub long_notional: Decimal,
    pub short_notional: Decimal,
}

impl AccountSummary {
    fn from_context(ctx: &AccountContext) -> Self {
        let mut positions_by_key = HashMap::new();
        let mut long_notional = Decimal::ZERO;
        let mut short_notional = Decimal::ZERO;

        for snapshot in &ctx.snapshots {
            let direction_str = match snapshot.direction {
                Direction::Long => "long",
                Direction::Short => "short",
            };
            let key = format!("{}:{}", snapshot.symbol, direction_str);
            positions_by_key.insert(key, snapshot.notional.abs());

            match snapshot.direction {
                Direction::Long => long_notional += snapshot.notional.abs(),
                Direction::Short => short_notional += snapshot.notional.abs(),
            }
        }

        Self {
            total_funds: ctx.total_margin_balance,
            fetched_at: ctx.fetched_at,
            positions_by_key,
            long_notional,
            short_notional,
        }
    }
}

struct CacheEntry {
    fetched_at: Instant,
    summary: AccountSummary,
}

/// Wraps an [`AccountDataSource`](monitor_core::ports::AccountDataSource)
/// with a 2 s TTL cache. Concurrent callers during an in-flight refresh
/// await the same fetch rather than issuing a second one;
/// a failed refresh falls back to the last cached summary and never
/// propagates an error to the caller.
pub struct AccountMetricsProvider {
    source: BoxAccountDataSource,
    ttl: Duration,
    cache: Mutex<Option<CacheEntry>>,
    refresh_gate: Mutex<()>,
}

impl std::fmt::Debug for AccountMetricsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountMetricsProvider")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl AccountMetricsProvider {
    pub fn new(source: BoxAccountDataSource, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn with_default_ttl(source: BoxAccountDataSource) -> Self {
        Self::new(source, Duration::from_secs(2))
    }

    pub async fn get_summary(&self) -> Option<AccountSummary> {
        if let Some(summary) = self.fresh_cached().await {
            return Some(summary);
        }

        let _gate = self.refresh_gate.lock().await;
        if let Some(summary) = self.fresh_cached().await {
            return Some(summary);
        }

        match self.source.fetch_account().await {
            Ok(ctx) => {
                let summary = AccountSummary::from_context(&ctx);
                let mut cache = self.cache.lock().await;
                *cache = Some(CacheEntry {
                    fetched_at: Instant::now(),
                    summary: summary.clone(),
                });
                Some(summary)
            }
            Err(err) => {
                warn!(error = %err, "account metrics refresh failed, falling back to cache");
                let cache = self.cache.lock().await;
                cache.as_ref().map(|entry| entry.summary.clone())
            }
        }
    }

    async fn fresh_cached(&self) -> Option<AccountSummary> {
        let cache = self.cache.lock().await;
        cache.as_ref().and_then(|entry| {
            if entry.fetched_at.elapsed() < self.ttl {
                Some(entry.summary.clone())
            } else {
                None
            }
        })
    }
}
