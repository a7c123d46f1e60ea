//! Chat-webhook HTTP POST sink with retry/backoff.
//!
//! One instance per sink (lifecycle, fill, position-alert — Section 6,
//! "Outputs"); all three share this implementation, parameterized only by
//! URL.

use async_trait::async_trait;
use monitor_core::backoff::BackoffPolicy;
use monitor_core::ports::{CardPayload, NotificationSink, PortError};
use reqwest::Client;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct WebhookSink {
    http: Client,
    url: String,
    policy: BackoffPolicy,
}

impl WebhookSink {
    pub fn new(http: Client, url: impl Into<String>, max_retry: u32) -> Self {
        Self {
            http,
            url: url.into(),
            policy: BackoffPolicy {
                max_attempts: max_retry,
                ..BackoffPolicy::webhook()
            },
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    /// Posts `payload` as JSON, retrying on transport error or non-2xx
    /// status with the standard webhook backoff. After the final attempt
    /// is exhausted, logs at error and returns `Ok(())` — per Section 7
    /// the disposition for a dropped notification is "log error and drop",
    /// not propagate a failure the caller would have nowhere to route.
    async fn send(&self, payload: CardPayload) -> Result<(), PortError> {
        let mut last_error = None;

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.policy.delay_ms(attempt - 1)))
                    .await;
            }

            match self.http.post(&self.url).json(&payload.0).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    last_error = Some(format!("webhook returned status {}", response.status()));
                }
                Err(err) => {
                    last_error = Some(err.to_string());
                }
            }
        }

        let error = last_error.unwrap_or_else(|| "unknown webhook failure".to_string());
        warn!(url = %self.url, error = %error, "webhook delivery exhausted retries, dropping notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_configured_retry_ceiling() {
        let sink = WebhookSink::new(Client::new(), "https://example.com/hook", 5);
        assert_eq!(sink.policy.max_attempts, 5);
    }
}
