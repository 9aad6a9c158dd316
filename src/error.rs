//! Error types for the build-beacon monitor.

use std::path::PathBuf;
use thiserror::Error;

use crate::sink::Output;

/// Top-level error type for monitor operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Network or protocol failure talking to the CI server.
    #[error("transport error: {0}")]
    Transport(String),

    /// The CI server answered, but the payload was missing or malformed.
    #[error("data error: {0}")]
    Data(String),

    /// The job exists but has never completed a build.
    #[error("job '{0}' has no build history")]
    NoBuildHistory(String),

    /// Configuration is missing, unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration at {path}: {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    /// Writing an output failed.
    #[error("failed to drive {output} output: {reason}")]
    Device { output: Output, reason: String },

    /// Invalid server address.
    #[error("invalid server address: {0}")]
    Url(#[from] url::ParseError),

    /// Malformed TOML configuration.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON from the CI server.
    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL, it may carry credentials.
        Error::Transport(err.without_url().to_string())
    }
}

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, Error>;
