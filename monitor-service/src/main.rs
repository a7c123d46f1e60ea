//! Process bootstrap: wires config, logging, the Binance
//! REST/stream transport, the order aggregation pipeline, and the
//! validation loop together, then runs until SIGINT/SIGTERM.

mod cards;
mod config;
mod error;
mod logging;
mod shutdown;
mod validation_service;
mod webhook;

use config::AppConfig;
use error::ServiceError;
use monitor_core::order::normalize::normalize;
use monitor_core::ports::BoxAccountDataSource;
use monitor_engine::{AccountMetricsProvider, AggregatorMessage, NotificationDispatcher, OrderAggregator};
use monitor_exchange::{BinanceRestClient, UserDataStream};
use monitor_risk::{MarketMetricsProvider, PositionRulesConfig};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

const MARKET_METRICS_TTL: Duration = Duration::from_secs(180);
const MARKET_METRICS_CONCURRENCY: usize = 8;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            // Logging is not initialized yet (it needs the config we just
            // failed to load), so report directly to stderr.
            eprintln!("startup failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.log_level, config.log_format);

    match run(config).await {
        Ok(()) => {
            info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), ServiceError> {
    let rules_json = std::fs::read_to_string(&config.position_rules_config_path).map_err(|source| {
        ServiceError::PositionRulesIo {
            path: config.position_rules_config_path.clone(),
            source,
        }
    })?;
    let rules_config = PositionRulesConfig::parse(&rules_json)?;

    let rest = Arc::new(BinanceRestClient::new(
        config.api_key.clone(),
        config.api_secret.clone(),
        config.futures_base_url.clone(),
        config.apex_base_url.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let stream = Arc::new(UserDataStream::new(
        Arc::clone(&rest),
        config.ws_base_url.clone(),
        config.listen_key_keepalive,
    ));
    let initial_listen_key = stream
        .acquire_initial_listen_key(&mut shutdown_rx.clone())
        .await
        .map_err(|err| ServiceError::ListenKeyUnobtainable(err.to_string()))?;
    info!("listen key acquired, starting workers");

    let account_source: BoxAccountDataSource = Arc::clone(&rest);
    let market_source: monitor_core::ports::BoxMarketDataSource = Arc::clone(&rest);
    let account_metrics = Arc::new(AccountMetricsProvider::with_default_ttl(account_source));
    let market_metrics = Arc::new(MarketMetricsProvider::new(
        market_source,
        MARKET_METRICS_TTL,
        MARKET_METRICS_CONCURRENCY,
    ));

    let http = reqwest::Client::new();
    let lifecycle_sink =
        Arc::new(webhook::WebhookSink::new(http.clone(), config.lifecycle_webhook_url.clone(), config.max_retry));
    let fill_sink =
        Arc::new(webhook::WebhookSink::new(http.clone(), config.fill_webhook_url.clone(), config.max_retry));
    let position_alert_sink = Arc::new(webhook::WebhookSink::new(
        http,
        config.position_alert_webhook_url.clone(),
        config.max_retry,
    ));

    let (aggregator_tx, aggregator_rx) = mpsc::unbounded_channel::<AggregatorMessage>();
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<monitor_core::notification::OrderNotification>();
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();

    let aggregator = OrderAggregator::new(
        Arc::clone(&account_metrics),
        config.aggregation_window,
        aggregator_tx.clone(),
        notify_tx,
    );
    let mut dispatcher = NotificationDispatcher::new(lifecycle_sink, fill_sink, Box::new(cards::OrderCard));

    let validation_account_source: BoxAccountDataSource = Arc::clone(&rest);
    let validation_service = validation_service::ValidationService::new(
        validation_account_source,
        Arc::clone(&market_metrics),
        rules_config,
        position_alert_sink,
        config.position_validation_interval,
    );

    let mut tasks = tokio::task::JoinSet::new();

    {
        let aggregator_shutdown = shutdown_rx.clone();
        tasks.spawn(async move { aggregator.run(aggregator_rx, aggregator_shutdown).await });
    }

    tasks.spawn(async move {
        while let Some(notification) = notify_rx.recv().await {
            dispatcher.dispatch(notification).await;
        }
    });

    // Bridges the raw WebSocket feed into the aggregator's message loop:
    // normalization (C2) happens here so a malformed frame never reaches
    // C5's serial worker at all.
    tasks.spawn(async move {
        while let Some(raw) = raw_rx.recv().await {
            match normalize(&raw) {
                Some(event) => {
                    let _ = aggregator_tx.send(AggregatorMessage::Event(event));
                }
                None => {
                    tracing::debug!("dropping unrecognized order-trade-update frame");
                }
            }
        }
    });

    {
        let stream = Arc::clone(&stream);
        let stream_shutdown = shutdown_rx.clone();
        tasks.spawn(async move {
            if let Err(err) = stream.run(initial_listen_key, raw_tx, stream_shutdown).await {
                error!(error = %err, "user-data stream worker exited");
            }
        });
    }

    {
        let validation_shutdown = shutdown_rx.clone();
        tasks.spawn(async move { validation_service.run(validation_shutdown).await });
    }

    tasks.spawn(async move { shutdown::wait_for_signal(shutdown_tx).await });

    // Runs until the signal task fires shutdown and every worker observes
    // it and returns.
    while tasks.join_next().await.is_some() {}

    Ok(())
}
