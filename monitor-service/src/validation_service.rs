//! C9 — validation service: the periodic tick loop that
//! fetches account context + market metrics, runs C7, feeds C8, and
//! dispatches a single digest card per tick.

use crate::cards::render_digest;
use monitor_core::notification::DigestCard;
use monitor_core::ports::{BoxAccountDataSource, BoxNotificationSink};
use monitor_risk::{AlertLimiter, MarketMetricsProvider, PositionRulesConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct ValidationService {
    account_source: BoxAccountDataSource,
    market_metrics: Arc<MarketMetricsProvider>,
    rules_config: PositionRulesConfig,
    limiter: AlertLimiter,
    alert_sink: BoxNotificationSink,
    interval: Duration,
    /// Single-flight guard. A plain `AtomicBool` suffices because
    /// only this loop ever touches it — ticks never run concurrently with
    /// each other, only potentially overlap the interval firing early.
    in_progress: AtomicBool,
}

impl std::fmt::Debug for ValidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationService")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl ValidationService {
    pub fn new(
        account_source: BoxAccountDataSource,
        market_metrics: Arc<MarketMetricsProvider>,
        rules_config: PositionRulesConfig,
        alert_sink: BoxNotificationSink,
        interval: Duration,
    ) -> Self {
        Self {
            account_source,
            market_metrics,
            rules_config,
            limiter: AlertLimiter::new(),
            alert_sink,
            interval,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Drives the tick loop until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // first tick fires immediately, skip it

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if self.in_progress.swap(true, Ordering::SeqCst) {
                        warn!("validation tick skipped, previous run still in progress");
                        continue;
                    }
                    self.tick().await;
                    self.in_progress.store(false, Ordering::SeqCst);
                }
            }
        }
    }

    async fn tick(&mut self) {
        let context = match self.account_source.fetch_account().await {
            Ok(ctx) => ctx,
            Err(err) => {
                error!(error = %err, "validation tick aborted, account fetch failed");
                return;
            }
        };

        let symbols = context.symbols_with_positions();
        let metrics_by_symbol = self.market_metrics.fetch_for_symbols(&symbols).await;

        let issues = monitor_risk::rules::evaluate(&context, &metrics_by_symbol, &self.rules_config);
        let events = self.limiter.process(&issues, chrono::Utc::now());

        if events.is_empty() {
            info!(asset_count = symbols.len(), "validation tick clean, no events");
            return;
        }

        let digest = DigestCard::from_events(events);
        info!(event_count = digest.events.len(), color = ?digest.color, "dispatching validation digest");
        let payload = render_digest(&digest);
        if let Err(err) = self.alert_sink.send(payload).await {
            warn!(error = %err, "position-alert sink rejected digest payload");
        }
    }
}
