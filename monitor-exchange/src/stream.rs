//! User-data-stream transport: listen-key lifecycle (create, keep-alive,
//! destroy) plus the reconnecting WebSocket client.
//!
//! Listen-key creation retries and stream reconnects share one
//! [`monitor_core::backoff::BackoffPolicy`] rather than each rolling their
//! own delay math.

use crate::error::ExchangeError;
use crate::rest::BinanceRestClient;
use futures_util::{SinkExt, StreamExt};
use monitor_core::backoff::BackoffPolicy;
use monitor_core::order::normalize::RawOrderTradeUpdate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const RECONNECT_MAX_DELAY_MS: u64 = 60_000;

/// Default keep-alive cadence.
pub const DEFAULT_KEEPALIVE_MS: u64 = 1_500_000;

#[derive(Debug, Clone)]
pub struct UserDataStream {
    rest: Arc<BinanceRestClient>,
    ws_base_url: String,
    keepalive: Duration,
}

impl UserDataStream {
    pub fn new(rest: Arc<BinanceRestClient>, ws_base_url: impl Into<String>, keepalive: Duration) -> Self {
        Self {
            rest,
            ws_base_url: ws_base_url.into(),
            keepalive,
        }
    }

    /// Obtains the first listen key for this session, bounded by the
    /// same 5-attempt backoff as a reconnect. Called once by
    /// the bootstrap before spawning [`Self::run`]: unlike a mid-stream
    /// key loss, failure here is a startup failure, so it is surfaced as an `Err` rather than swallowed.
    pub async fn acquire_initial_listen_key(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<String, ExchangeError> {
        self.create_listen_key_with_retry(shutdown)
            .await
            .ok_or(ExchangeError::ListenKeyExpired)
    }

    /// `ORDER_TRADE_UPDATE` frame on `tx`. Reconnects with exponential
    /// backoff on disconnect or listen-key expiry, re-creating the listen
    /// key as needed; returns only once shutdown is observed. A listen
    /// key that cannot be re-created after a disconnect is treated as
    /// transient I/O, not a fatal condition — the outer
    /// reconnect backoff keeps retrying indefinitely rather than ending
    /// the stream, since only the very first key (acquired by
    /// [`Self::acquire_initial_listen_key`] before this loop starts) is a
    /// startup-failure concern.
    pub async fn run(
        &self,
        initial_listen_key: String,
        tx: mpsc::UnboundedSender<RawOrderTradeUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ExchangeError> {
        let mut reconnect_attempt: u32 = 0;
        let mut next_listen_key = Some(initial_listen_key);

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let listen_key = match next_listen_key.take() {
                Some(key) => key,
                None => match self.create_listen_key_with_retry(&mut shutdown).await {
                    Some(key) => key,
                    None if *shutdown.borrow() => return Ok(()),
                    None => {
                        warn!("listen key re-creation exhausted retries, backing off and trying again");
                        let delay_ms = BackoffPolicy {
                            max_ms: RECONNECT_MAX_DELAY_MS,
                            ..BackoffPolicy::listen_key()
                        }
                        .delay_ms(reconnect_attempt);
                        reconnect_attempt = reconnect_attempt.saturating_add(1);
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        continue;
                    }
                },
            };

            let session_result = self.run_session(&listen_key, &tx, &mut shutdown).await;
            let _ = self.rest.delete_listen_key(&listen_key).await;

            if *shutdown.borrow() {
                return Ok(());
            }

            match session_result {
                Ok(()) => reconnect_attempt = 0,
                Err(err) => {
                    warn!(error = %err, attempt = reconnect_attempt, "user-data stream session ended, reconnecting");
                }
            }

            let delay_ms = BackoffPolicy {
                max_ms: RECONNECT_MAX_DELAY_MS,
                ..BackoffPolicy::listen_key()
            }
            .delay_ms(reconnect_attempt);
            reconnect_attempt = reconnect_attempt.saturating_add(1);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    async fn create_listen_key_with_retry(&self, shutdown: &mut watch::Receiver<bool>) -> Option<String> {
        let policy = BackoffPolicy::listen_key();
        for attempt in 0..policy.max_attempts {
            if *shutdown.borrow() {
                return None;
            }
            match self.rest.create_listen_key().await {
                Ok(key) => return Some(key),
                Err(err) => {
                    warn!(error = %err, attempt, "listen key creation failed");
                    tokio::time::sleep(Duration::from_millis(policy.delay_ms(attempt))).await;
                }
            }
        }
        None
    }

    async fn run_session(
        &self,
        listen_key: &str,
        tx: &mpsc::UnboundedSender<RawOrderTradeUpdate>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), ExchangeError> {
        let url = format!("{}/ws/{}", self.ws_base_url, listen_key);
        let (ws_stream, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut write, mut read) = ws_stream.split();
        info!("user-data stream connected");

        let mut keepalive_timer = tokio::time::interval(self.keepalive);
        keepalive_timer.tick().await; // first tick fires immediately, skip it

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
                _ = keepalive_timer.tick() => {
                    if let Err(err) = self.rest.keepalive_listen_key(listen_key).await {
                        warn!(error = %err, "listen key keep-alive failed");
                        return Err(ExchangeError::ListenKeyExpired);
                    }
                    debug!("listen key keep-alive sent");
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if self.handle_text_frame(&text, tx).is_expired() {
                                return Err(ExchangeError::ListenKeyExpired);
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = write.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(ExchangeError::WebSocket(
                                tokio_tungstenite::tungstenite::Error::ConnectionClosed,
                            ));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => return Err(ExchangeError::WebSocket(err)),
                    }
                }
            }
        }
    }

    fn handle_text_frame(
        &self,
        text: &str,
        tx: &mpsc::UnboundedSender<RawOrderTradeUpdate>,
    ) -> FrameOutcome {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(err) => {
                debug!(error = %err, "dropping unparsable stream frame");
                return FrameOutcome::Continue;
            }
        };

        if value.get("e").and_then(|e| e.as_str()) == Some("listenKeyExpired") {
            warn!("listenKeyExpired event received, forcing reconnect");
            return FrameOutcome::ListenKeyExpired;
        }

        match serde_json::from_value::<RawOrderTradeUpdate>(value) {
            Ok(raw) if raw.e == "ORDER_TRADE_UPDATE" => {
                let _ = tx.send(raw);
            }
            Ok(_) => {} // other account event kinds are not this system's concern
            Err(err) => debug!(error = %err, "dropping message with unexpected schema"),
        }
        FrameOutcome::Continue
    }
}

enum FrameOutcome {
    Continue,
    ListenKeyExpired,
}

impl FrameOutcome {
    fn is_expired(&self) -> bool {
        matches!(self, FrameOutcome::ListenKeyExpired)
    }
}
