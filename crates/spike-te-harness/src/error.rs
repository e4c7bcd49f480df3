//! Harness error type.

use spike_te_core::TeError;

/// Errors raised while generating scenarios, running estimates or writing
/// reports.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("estimator: {0}")]
    Estimator(#[from] TeError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
