//! Error types for the WebSocket transport.

use graphql_subscriber_core::SubscriberError;

/// Result type alias for networking operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Network-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid header name or value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// WebSocket handshake or stream error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The connection was not established in time.
    #[error("Connection timed out")]
    Timeout,

    /// Connection refused or failed.
    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for NetworkError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for NetworkError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for NetworkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::Io(e) => Self::Connection(e.to_string()),
            Error::Url(e) => Self::InvalidUrl(e.to_string()),
            other => Self::WebSocket(other.to_string()),
        }
    }
}

impl From<NetworkError> for SubscriberError {
    fn from(err: NetworkError) -> Self {
        SubscriberError::Transport(err.to_string())
    }
}
