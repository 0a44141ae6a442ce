//! Wire messages of the graphql-transport-ws protocol.
//!
//! See: https://github.com/enisdenjo/graphql-ws/blob/master/PROTOCOL.md

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::SubscribeRequest;

/// Subprotocol name negotiated during the WebSocket handshake.
pub const SUBPROTOCOL: &str = "graphql-transport-ws";

/// Every message kind known to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Client -> Server: initialize the connection.
    ConnectionInit,
    /// Server -> Client: connection accepted.
    ConnectionAck,
    /// Server -> Client: connection rejected.
    ConnectionError,
    /// Server -> Client: keep-alive notice.
    ConnectionKeepAlive,
    /// Client -> Server: end the connection.
    ConnectionTerminate,
    /// Bidirectional ping.
    Ping,
    /// Bidirectional pong.
    Pong,
    /// Server -> Client: operation result.
    Next,
    /// Server -> Client: operation error.
    Error,
    /// Server -> Client: error notice from legacy servers.
    ErrorMessage,
    /// Operation finished.
    Complete,
    /// Client -> Server: start an operation.
    Subscribe,
}

impl MessageType {
    /// The `type` field value on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionInit => "connection_init",
            Self::ConnectionAck => "connection_ack",
            Self::ConnectionError => "connection_error",
            Self::ConnectionKeepAlive => "connection_keep_alive",
            Self::ConnectionTerminate => "connection_terminate",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Next => "next",
            Self::Error => "error",
            Self::ErrorMessage => "error_message",
            Self::Complete => "complete",
            Self::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `subscribe` frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribePayload {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl From<&SubscribeRequest> for SubscribePayload {
    fn from(request: &SubscribeRequest) -> Self {
        Self {
            query: request.query.clone(),
            variables: request.variables.clone(),
            extensions: request.extensions.clone(),
        }
    }
}

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Initialize the connection.
    ConnectionInit { payload: Value },
    /// Subscribe to an operation.
    Subscribe { id: String, payload: SubscribePayload },
    /// End the connection.
    ConnectionTerminate,
}

impl ClientMessage {
    /// The message kind.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ConnectionInit { .. } => MessageType::ConnectionInit,
            Self::Subscribe { .. } => MessageType::Subscribe,
            Self::ConnectionTerminate => MessageType::ConnectionTerminate,
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Frames received from the server.
///
/// Kinds this client does not act on still parse, so that they can be
/// ignored rather than reported as malformed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection acknowledged.
    ConnectionAck {
        #[serde(default)]
        payload: Option<Value>,
    },
    /// Operation result.
    Next {
        id: String,
        #[serde(default)]
        payload: Value,
    },
    /// Operation error.
    Error {
        id: String,
        #[serde(default)]
        payload: Value,
    },
    /// Operation complete.
    Complete { id: String },
    /// Connection rejected.
    ConnectionError {
        #[serde(default)]
        payload: Option<Value>,
    },
    /// Keep-alive notice.
    ConnectionKeepAlive,
    /// Ping.
    Ping {
        #[serde(default)]
        payload: Option<Value>,
    },
    /// Pong.
    Pong {
        #[serde(default)]
        payload: Option<Value>,
    },
    /// Any other `type`.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Decode a JSON text frame.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// The message kind, or `None` for unknown kinds.
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            Self::ConnectionAck { .. } => Some(MessageType::ConnectionAck),
            Self::Next { .. } => Some(MessageType::Next),
            Self::Error { .. } => Some(MessageType::Error),
            Self::Complete { .. } => Some(MessageType::Complete),
            Self::ConnectionError { .. } => Some(MessageType::ConnectionError),
            Self::ConnectionKeepAlive => Some(MessageType::ConnectionKeepAlive),
            Self::Ping { .. } => Some(MessageType::Ping),
            Self::Pong { .. } => Some(MessageType::Pong),
            Self::Unknown => None,
        }
    }
}
