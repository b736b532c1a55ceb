//! Error handling and custom error types
//!
//! Provides unified error handling across the gateway using thiserror.
//! Failures inside the candidate loop are not errors; they are carried as
//! [`crate::upstream::Outcome`] values and classified.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API Key is missing")]
    MissingApiKey,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model discovery error: {0}")]
    Discovery(String),
}

pub type Result<T> = std::result::Result<T, Error>;
