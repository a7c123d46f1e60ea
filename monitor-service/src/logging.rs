//! Structured logging bootstrap with a human/JSON renderer split. The
//! renderer is selected by `LOG_FORMAT`; the level floor comes from
//! `LOG_LEVEL` by way of `RUST_LOG`-style `EnvFilter` parsing.

use crate::config::LogFormat;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initializes the global `tracing` subscriber. `default_level` seeds the
/// `EnvFilter` floor when `RUST_LOG` is unset; `RUST_LOG` still wins when
/// present.
pub fn init(default_level: &str, format: LogFormat) {
    let filter = tracing_subscriber::filter::EnvFilter::builder()
        .with_default_directive(
            default_level
                .parse()
                .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .from_env_lossy();

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init(),
    }
}
