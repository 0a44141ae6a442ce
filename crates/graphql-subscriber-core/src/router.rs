//! Inbound frame routing.

use std::sync::Arc;

use serde_json::Value;

use crate::logging::{LogCategory, LogSeverity, Logger, targets};
use crate::protocol::ServerMessage;

/// Receives the actions the router derives from inbound frames.
pub trait MessageHandler {
    /// `connection_ack` arrived.
    fn on_ack(&self);
    /// Deliver `payload` to every subscriber of `id`.
    fn on_next(&self, id: &str, payload: &Value);
    /// The server finished subscription `id`.
    fn on_complete(&self, id: &str);
}

/// Parses inbound frames and dispatches them by message type.
///
/// | type | action |
/// |---|---|
/// | `connection_ack` | [`MessageHandler::on_ack`] |
/// | `next` | [`MessageHandler::on_next`] |
/// | `complete` | [`MessageHandler::on_complete`] |
/// | `error` | [`MessageHandler::on_next`], then logged at emergency severity |
/// | anything else | ignored |
///
/// Frames that fail to parse are logged at error severity and dropped.
pub struct MessageRouter {
    logger: Arc<dyn Logger>,
}

impl MessageRouter {
    /// Create a router reporting to `logger`.
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Route one raw frame.
    pub fn route(&self, raw: &str, handler: &impl MessageHandler) {
        if raw.trim().is_empty() {
            return;
        }

        let message = match ServerMessage::from_json(raw) {
            Ok(message) => message,
            Err(e) => {
                self.logger.log(
                    LogSeverity::Error,
                    LogCategory::System,
                    "Could not parse server message",
                    Some(&Value::String(e.to_string())),
                );
                return;
            }
        };

        match message {
            ServerMessage::ConnectionAck { .. } => handler.on_ack(),
            ServerMessage::Next { id, payload } => handler.on_next(&id, &payload),
            ServerMessage::Complete { id } => handler.on_complete(&id),
            ServerMessage::Error { id, payload } => {
                handler.on_next(&id, &payload);
                let data = serde_json::json!({ "id": id, "payload": payload });
                self.logger.log(
                    LogSeverity::Emergency,
                    LogCategory::System,
                    "Error occurs during subscription",
                    Some(&data),
                );
            }
            other => {
                tracing::trace!(
                    target: targets::ROUTER,
                    message_type = other.message_type().map_or("unknown", |t| t.as_str()),
                    "ignoring message"
                );
            }
        }
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter").finish_non_exhaustive()
    }
}
