//! Central error type for the monitor-core crate.
//!
//! Aggregates the small number of ways the pure domain layer (classification,
//! normalization, decimal parsing) can fail. Transport and I/O errors live in
//! their owning crates (`monitor-exchange`, `monitor-risk`, `monitor-service`)
//! and wrap this type with `#[from]` where they call back into core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Error)]
pub enum CoreError {
    #[error("malformed wire message: {0}")]
    MalformedEvent(String),

    #[error("invalid decimal literal: {0}")]
    InvalidDecimal(String),
}
