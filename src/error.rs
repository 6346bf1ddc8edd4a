//! Error types for the OAC client

use std::io;

use thiserror::Error;

/// Result type alias for the OAC client
pub type Result<T> = std::result::Result<T, Error>;

/// OAC client errors
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required settings are absent or empty
    #[error("Configuration error: missing required settings: {}", .0.join(", "))]
    MissingConfig(Vec<&'static str>),

    /// Grant type is neither `client_credentials` nor `resource_owner`
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrant(String),

    /// The identity provider did not issue a token
    #[error("Failed to obtain token: {0}")]
    TokenExchange(String),

    /// The API answered outside the 2xx range
    #[error("Request failed: {status} {body}")]
    Request {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The response looked like JSON but did not parse
    #[error("Malformed JSON response: {0}")]
    Format(#[source] serde_json::Error),

    /// The request could not be sent or its response read
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status of a failed API request, if that is what this error is
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}
