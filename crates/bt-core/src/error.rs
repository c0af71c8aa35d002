//! Core error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant (`#[from]`) where configuration problems can surface.

use thiserror::Error;

/// Errors raised while validating episode configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown metric name {0:?}")]
    UnknownMetric(String),

    #[error("holding window [{start}, {end}] s lies outside episode [0, {duration}] s")]
    InvalidWindow {
        start:    f64,
        end:      f64,
        duration: f64,
    },
}

/// Shorthand result type for `bt-core`.
pub type CoreResult<T> = Result<T, CoreError>;
