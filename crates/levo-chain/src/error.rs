use std::time::Duration;

use thiserror::Error;

pub use levo_models::FailureKind;

#[derive(Error, Debug)]
pub enum ChainReadError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Malformed contract data: {0}")]
    Malformed(String),

    #[error("Value does not fit a decimal: {0}")]
    Overflow(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("Asset not configured: {0}")]
    MissingAsset(String),

    #[error("Contract address not configured: {0}")]
    MissingContract(&'static str),

    #[error("{0} requires a non-zero amount")]
    ZeroAmount(&'static str),

    #[error("Route from {0} into itself")]
    SameAssetRoute(String),
}

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Routing API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Routing API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Routing API response invalid: {0}")]
    Invalid(String),
}

/// A classified step failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} ({message})")]
pub struct ExecutionError {
    pub kind: FailureKind,
    pub message: String,
}

impl ExecutionError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a raw provider/node error message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: crate::classify::classify_error(&message),
            message,
        }
    }
}

impl From<RouteError> for ExecutionError {
    fn from(e: RouteError) -> Self {
        ExecutionError::new(FailureKind::Unknown(e.to_string()), e.to_string())
    }
}

/// The node did not answer a nonce fetch or a send in time.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Node did not answer within {}s", .0.as_secs())]
pub struct SendTimedOut(pub Duration);

impl From<SendTimedOut> for ExecutionError {
    fn from(e: SendTimedOut) -> Self {
        ExecutionError::new(FailureKind::Timeout, e.to_string())
    }
}
