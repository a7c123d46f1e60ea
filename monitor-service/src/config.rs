//! Environment-variable configuration. Loaded once at startup into a typed [`AppConfig`]; any
//! missing required variable or unparsable value fails fast with a
//! nonzero exit.

use crate::error::ServiceError;
use std::time::Duration;

fn required(name: &str) -> Result<String, ServiceError> {
    std::env::var(name).map_err(|_| ServiceError::MissingEnvVar(name.to_string()))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_u64(name: &str, default: u64) -> Result<u64, ServiceError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ServiceError::InvalidEnvVar {
            name: name.to_string(),
            reason: format!("expected a positive integer, got {raw:?}"),
        }),
    }
}

fn optional_u32(name: &str, default: u32) -> Result<u32, ServiceError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ServiceError::InvalidEnvVar {
            name: name.to_string(),
            reason: format!("expected a positive integer, got {raw:?}"),
        }),
    }
}

/// Output format `tracing-subscriber` renders to, selected by the
/// `LOG_FORMAT` env knob this system adds alongside `LOG_LEVEL`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub api_secret: String,
    pub futures_base_url: String,
    pub ws_base_url: String,
    pub apex_base_url: String,

    pub lifecycle_webhook_url: String,
    pub fill_webhook_url: String,
    pub position_alert_webhook_url: String,

    pub aggregation_window: Duration,
    pub listen_key_keepalive: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
    pub max_retry: u32,
    pub position_validation_interval: Duration,
    pub position_rules_config_path: String,
}

impl AppConfig {
    /// Loads and validates every variable documented in Section 6. Returns
    /// the first missing/invalid variable encountered; callers exit
    /// nonzero on `Err`.
    pub fn from_env() -> Result<Self, ServiceError> {
        Ok(Self {
            api_key: required("BINANCE_API_KEY")?,
            api_secret: required("BINANCE_API_SECRET")?,
            futures_base_url: optional("BINANCE_FUTURES_BASE_URL", "https://fapi.binance.com"),
            ws_base_url: optional("BINANCE_WS_BASE_URL", "wss://fstream.binance.com"),
            apex_base_url: optional("APEX_BASE_URL", "https://api.apex.exchange"),

            lifecycle_webhook_url: required("LIFECYCLE_WEBHOOK_URL")?,
            fill_webhook_url: required("FILL_WEBHOOK_URL")?,
            position_alert_webhook_url: required("POSITION_ALERT_WEBHOOK_URL")?,

            aggregation_window: Duration::from_millis(optional_u64("AGGREGATION_WINDOW_MS", 10_000)?),
            listen_key_keepalive: Duration::from_millis(optional_u64(
                "LISTEN_KEY_KEEPALIVE_MS",
                1_500_000,
            )?),
            log_level: optional("LOG_LEVEL", "info"),
            log_format: match optional("LOG_FORMAT", "text").to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            },
            max_retry: optional_u32("MAX_RETRY", 3)?,
            position_validation_interval: Duration::from_millis(optional_u64(
                "POSITION_VALIDATION_INTERVAL_MS",
                30_000,
            )?),
            position_rules_config_path: optional(
                "POSITION_RULES_CONFIG_PATH",
                "config/position-rules.json",
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear() {
        for key in [
            "BINANCE_API_KEY",
            "BINANCE_API_SECRET",
            "LIFECYCLE_WEBHOOK_URL",
            "FILL_WEBHOOK_URL",
            "POSITION_ALERT_WEBHOOK_URL",
            "AGGREGATION_WINDOW_MS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn missing_required_var_fails_fast() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ServiceError::MissingEnvVar(name) if name == "BINANCE_API_KEY"));
    }

    #[test]
    fn defaults_apply_when_optional_vars_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        std::env::set_var("BINANCE_API_KEY", "k");
        std::env::set_var("BINANCE_API_SECRET", "s");
        std::env::set_var("LIFECYCLE_WEBHOOK_URL", "https://example.com/a");
        std::env::set_var("FILL_WEBHOOK_URL", "https://example.com/b");
        std::env::set_var("POSITION_ALERT_WEBHOOK_URL", "https://example.com/c");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.aggregation_window, Duration::from_secs(10));
        assert_eq!(config.max_retry, 3);
        clear();
    }

    #[test]
    fn invalid_numeric_var_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        std::env::set_var("BINANCE_API_KEY", "k");
        std::env::set_var("BINANCE_API_SECRET", "s");
        std::env::set_var("LIFECYCLE_WEBHOOK_URL", "https://example.com/a");
        std::env::set_var("FILL_WEBHOOK_URL", "https://example.com/b");
        std::env::set_var("POSITION_ALERT_WEBHOOK_URL", "https://example.com/c");
        std::env::set_var("AGGREGATION_WINDOW_MS", "not-a-number");

        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ServiceError::InvalidEnvVar { name, .. } if name == "AGGREGATION_WINDOW_MS"));
        clear();
    }
}
