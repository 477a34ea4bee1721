//! Error types for the Fleet client

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the management server
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Credentials were rejected or no token could be obtained
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The API URL cannot be turned into a request or stream URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Websocket protocol or connection failure
    #[error("Websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// Stream carried something other than a text message
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }
}
