use thiserror::Error;

use crate::config::ConfigError;

/// Failures inside the observation layer. These never reach host code:
/// interposers absorb them and carry on forwarding the call.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe state is already borrowed (re-entrant observation)")]
    Reentrant,

    #[error("report sink failed: {0}")]
    Sink(String),

    #[error("stack capture failed: {0}")]
    Trace(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<std::cell::BorrowMutError> for ProbeError {
    fn from(_: std::cell::BorrowMutError) -> Self {
        ProbeError::Reentrant
    }
}

impl From<std::cell::BorrowError> for ProbeError {
    fn from(_: std::cell::BorrowError) -> Self {
        ProbeError::Reentrant
    }
}
