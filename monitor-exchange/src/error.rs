//! Error type for the Binance transport layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket transport error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("authentication rejected (401)")]
    Unauthorized,

    #[error("response deserialization failed: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("listen key expired or invalid")]
    ListenKeyExpired,
}

impl From<ExchangeError> for monitor_core::ports::PortError {
    fn from(value: ExchangeError) -> Self {
        monitor_core::ports::PortError(value.to_string())
    }
}
