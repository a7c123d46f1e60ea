//! Top-level error type for process bootstrap.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),

    #[error("invalid environment variable {name}: {reason}")]
    InvalidEnvVar { name: String, reason: String },

    #[error("failed to read position rules config at {path}: {source}")]
    PositionRulesIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse position rules config: {0}")]
    PositionRulesInvalid(#[from] monitor_risk::RiskError),

    #[error("could not obtain a listen key after retrying: {0}")]
    ListenKeyUnobtainable(String),
}
