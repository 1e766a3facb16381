use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalFetchError {
    #[error("Signal transport error: {0}")]
    Transport(String),

    #[error("Signal decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SignalFetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SignalFetchError::Decode(e.to_string())
        } else {
            SignalFetchError::Transport(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum AdvisoryError {
    #[error("Advisor transport error: {0}")]
    Transport(String),

    #[error("Advisor returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Advisor timed out after {0} seconds")]
    Timeout(u64),

    #[error("Advisor call cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AdvisoryError {
    fn from(e: reqwest::Error) -> Self {
        AdvisoryError::Transport(e.to_string())
    }
}
