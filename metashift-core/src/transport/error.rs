use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http client setup failed: {0}")]
    Client(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("telegram api error {code:?}: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },
    #[error("invalid api response: {0}")]
    Decode(String),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        // Request URLs carry the bot token; strip them before the error is logged.
        if error.is_decode() {
            TransportError::Decode(error.without_url().to_string())
        } else if error.is_timeout() {
            TransportError::Network(format!("timeout: {}", error.without_url()))
        } else {
            TransportError::Network(error.without_url().to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(error: serde_json::Error) -> Self {
        TransportError::Decode(error.to_string())
    }
}
