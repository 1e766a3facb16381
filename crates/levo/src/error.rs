use levo_agents::{AdvisoryError, SignalFetchError};
use levo_chain::{BuildError, ChainReadError};
use levo_models::SessionId;
use thiserror::Error;

/// A stage failure that ends the current cycle without executing a bundle.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Market signal unavailable: {0}")]
    Signal(#[from] SignalFetchError),

    #[error("Position read failed: {0}")]
    Position(#[from] ChainReadError),

    #[error("Advisor failed: {0}")]
    Advisory(#[from] AdvisoryError),

    #[error("Bundle could not be built: {0}")]
    Build(#[from] BuildError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session {0} is already active")]
    AlreadyActive(SessionId),

    #[error("Session {0} was stopped and cannot be restarted")]
    AlreadyStopped(SessionId),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
}
