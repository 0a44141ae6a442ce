//! Connection handshake and lifecycle.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::error::{Result, SubscriberError};
use crate::logging::{LogCategory, LogSeverity, Logger, targets};
use crate::protocol::ClientMessage;
use crate::transport::Transport;

/// State of the single connection a manager owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// The transport has not opened yet.
    #[default]
    Connecting,
    /// Open, `connection_init` sent, waiting for `connection_ack`.
    Open,
    /// Open and acknowledged; subscriptions may be sent.
    Acknowledged,
    /// The transport closed on its own. Terminal.
    Closed,
    /// Closed by [`ConnectionController::terminate`]. Terminal.
    Terminated,
}

impl ConnectionState {
    /// Whether no further progress is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Terminated)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Acknowledged => "acknowledged",
            Self::Closed => "closed",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Owns the transport and drives the `connection_init`/`connection_ack`
/// handshake.
pub struct ConnectionController {
    transport: Arc<dyn Transport>,
    state: watch::Sender<ConnectionState>,
    init_payload: Value,
    logger: Arc<dyn Logger>,
}

impl ConnectionController {
    /// Wrap `transport`. Nothing is sent until the transport opens.
    pub fn new(transport: Arc<dyn Transport>, init_payload: Value, logger: Arc<dyn Logger>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            transport,
            state,
            init_payload,
            logger,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether subscribe frames may be sent right now.
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Acknowledged && self.transport.is_ready()
    }

    /// Ask the transport to connect.
    pub fn connect(&self) {
        self.transport.connect();
    }

    /// The transport opened: send `connection_init`.
    pub fn handle_open(&self) {
        let opened = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Open;
                true
            } else {
                false
            }
        });
        if !opened {
            return;
        }

        self.logger.log(
            LogSeverity::Info,
            LogCategory::System,
            "Websocket connection established",
            None,
        );

        let init = ClientMessage::ConnectionInit {
            payload: self.init_payload.clone(),
        };
        if let Err(e) = self.send(&init) {
            self.logger.log(
                LogSeverity::Error,
                LogCategory::System,
                "Could not send connection init",
                Some(&Value::String(e.to_string())),
            );
        }
    }

    /// `connection_ack` arrived. Returns `true` if this moved the state to
    /// [`ConnectionState::Acknowledged`].
    ///
    /// Only an open connection that has sent `connection_init` can be
    /// acknowledged; an ack received earlier is ignored.
    pub fn acknowledge(&self) -> bool {
        let acknowledged = self.state.send_if_modified(|state| match state {
            ConnectionState::Open => {
                *state = ConnectionState::Acknowledged;
                true
            }
            _ => false,
        });
        if acknowledged {
            tracing::debug!(target: targets::CONNECTION, "connection acknowledged");
        } else {
            tracing::debug!(target: targets::CONNECTION, state = %self.state(), "ignoring connection ack");
        }
        acknowledged
    }

    /// The transport reported an error. Logged only; no reconnect.
    pub fn handle_error(&self, message: &str) {
        self.logger.log(
            LogSeverity::Emergency,
            LogCategory::System,
            "Error occurs during socket connection",
            Some(&Value::String(message.to_string())),
        );
    }

    /// The transport closed. Logged; the state becomes terminal.
    pub fn handle_close(&self) {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Terminated {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        });
        self.logger.log(LogSeverity::Info, LogCategory::System, "Socket connection closed", None);
    }

    /// Encode `message` and hand it to the transport.
    pub fn send(&self, message: &ClientMessage) -> Result<()> {
        let text = message.to_json()?;
        tracing::trace!(
            target: targets::CONNECTION,
            message_type = %message.message_type(),
            frame = %text,
            "sending frame"
        );
        self.transport.send(text)
    }

    /// Send `connection_terminate` and close the transport. Idempotent.
    ///
    /// Closing the transport also stops any keep-alive timer it runs.
    pub fn terminate(&self) {
        let previous = self.state.send_replace(ConnectionState::Terminated);
        if previous == ConnectionState::Terminated {
            return;
        }

        if self.transport.is_ready()
            && let Err(e) = self.send(&ClientMessage::ConnectionTerminate)
        {
            tracing::debug!(target: targets::CONNECTION, error = %e, "terminate frame not sent");
        }
        self.transport.close();
    }

    /// Resolve once the connection is acknowledged.
    ///
    /// Fails with [`SubscriberError::ConnectionClosed`] if the connection
    /// reaches a terminal state first.
    pub async fn wait_until_ready(&self) -> Result<()> {
        let mut receiver = self.state.subscribe();
        let state = receiver
            .wait_for(|state| *state == ConnectionState::Acknowledged || state.is_terminal())
            .await
            .map_err(|_| SubscriberError::ConnectionClosed)?;
        if *state == ConnectionState::Acknowledged {
            Ok(())
        } else {
            Err(SubscriberError::ConnectionClosed)
        }
    }
}

impl fmt::Debug for ConnectionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionController")
            .field("state", &self.state())
            .field("transport_ready", &self.transport.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoopLogger;
    use crate::transport::MemoryTransport;
    use parking_lot::Mutex;
    use serde_json::json;

    fn controller(transport: &MemoryTransport) -> ConnectionController {
        ConnectionController::new(Arc::new(transport.clone()), json!({}), Arc::new(NoopLogger))
    }

    #[test]
    fn test_open_sends_connection_init() {
        let transport = MemoryTransport::new();
        let controller = controller(&transport);
        controller.connect();
        assert!(transport.connect_requested());
        assert_eq!(controller.state(), ConnectionState::Connecting);

        transport.open();
        controller.handle_open();
        assert_eq!(controller.state(), ConnectionState::Open);
        assert!(!controller.is_ready());
        assert_eq!(
            transport.sent_json(),
            vec![json!({"type": "connection_init", "payload": {}})]
        );

        // A second open notification does not resend the init frame.
        controller.handle_open();
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_custom_init_payload() {
        let transport = MemoryTransport::new();
        let controller = ConnectionController::new(
            Arc::new(transport.clone()),
            json!({"authToken": "secret"}),
            Arc::new(NoopLogger),
        );
        transport.open();
        controller.handle_open();
        assert_eq!(transport.sent_json()[0]["payload"]["authToken"], "secret");
    }

    #[test]
    fn test_acknowledge_once() {
        let transport = MemoryTransport::new();
        let controller = controller(&transport);
        transport.open();
        controller.handle_open();

        assert!(controller.acknowledge());
        assert!(!controller.acknowledge());
        assert!(controller.is_ready());
    }

    #[test]
    fn test_ack_before_open_is_ignored() {
        let transport = MemoryTransport::new();
        let controller = controller(&transport);

        assert!(!controller.acknowledge());
        assert_eq!(controller.state(), ConnectionState::Connecting);

        transport.open();
        controller.handle_open();
        assert_eq!(controller.state(), ConnectionState::Open);
        assert_eq!(transport.sent_json()[0]["type"], "connection_init");
        assert!(controller.acknowledge());
    }

    #[test]
    fn test_terminate_sends_frame_and_closes() {
        let transport = MemoryTransport::new();
        let controller = controller(&transport);
        transport.open();
        controller.handle_open();
        controller.acknowledge();

        controller.terminate();
        controller.terminate();

        assert_eq!(controller.state(), ConnectionState::Terminated);
        assert!(transport.is_closed());
        let frames = transport.sent_json();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], json!({"type": "connection_terminate"}));
        assert!(!controller.acknowledge());
    }

    #[test]
    fn test_terminate_before_open() {
        let transport = MemoryTransport::new();
        let controller = controller(&transport);
        controller.terminate();
        assert!(transport.sent().is_empty());
        assert!(transport.is_closed());
    }

    #[test]
    fn test_remote_close_and_errors_are_logged() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let records_clone = records.clone();
        let logger = move |severity: LogSeverity, _: LogCategory, message: &str, _: Option<&Value>| {
            records_clone.lock().push((severity, message.to_string()));
        };
        let transport = MemoryTransport::new();
        let controller =
            ConnectionController::new(Arc::new(transport.clone()), json!({}), Arc::new(logger));

        controller.handle_error("connection reset");
        controller.handle_close();

        assert_eq!(controller.state(), ConnectionState::Closed);
        let records = records.lock();
        assert_eq!(records[0].0, LogSeverity::Emergency);
        assert_eq!(records[1], (LogSeverity::Info, "Socket connection closed".to_string()));
    }

    #[tokio::test]
    async fn test_wait_until_ready() {
        let transport = MemoryTransport::new();
        let controller = Arc::new(controller(&transport));

        let waiter = controller.clone();
        let handle = tokio::spawn(async move { waiter.wait_until_ready().await });

        transport.open();
        controller.handle_open();
        controller.acknowledge();

        assert_eq!(handle.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_wait_until_ready_fails_when_closed() {
        let transport = MemoryTransport::new();
        let controller = controller(&transport);
        controller.handle_close();
        assert_eq!(
            controller.wait_until_ready().await,
            Err(SubscriberError::ConnectionClosed)
        );
    }
}
