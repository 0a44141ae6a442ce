//! Error types for graphql-subscriber.

/// Result type alias for subscriber operations.
pub type Result<T> = std::result::Result<T, SubscriberError>;

/// Errors that can occur while driving a subscription connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriberError {
    /// The transport refused or failed to send a frame.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport is not connected.
    #[error("Not connected")]
    NotConnected,

    /// The connection was closed before it became ready.
    #[error("Connection closed before acknowledgement")]
    ConnectionClosed,

    /// A protocol frame could not be encoded or decoded.
    #[error("Malformed frame: {0}")]
    Frame(String),
}

impl SubscriberError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

impl From<serde_json::Error> for SubscriberError {
    fn from(err: serde_json::Error) -> Self {
        Self::Frame(err.to_string())
    }
}
