//! Error types for the desktop agent

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Backend answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// A device command could not be fulfilled (missing auth, bad payload,
    /// operator rejection). Always acknowledged as FAILED, never fatal.
    #[error("command error: {0}")]
    Command(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("prompt error: {0}")]
    Prompt(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for command precondition failures.
    pub fn command(message: impl Into<String>) -> Self {
        Error::Command(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
