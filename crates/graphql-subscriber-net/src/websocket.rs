//! WebSocket transport with signal-based event delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use graphql_subscriber_core::logging::targets;
use graphql_subscriber_core::protocol::SUBPROTOCOL;
use graphql_subscriber_core::{SubscriberError, Transport, TransportEvents};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::config::DEFAULT_CONNECTION_TIMEOUT;
use crate::error::{NetworkError, Result};

/// Settings for a single WebSocket connection.
#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// The WebSocket URL (ws:// or wss://).
    pub url: String,
    /// Custom headers to send during the handshake.
    pub headers: HashMap<String, String>,
    /// Interval of WebSocket ping frames. `None` disables keep-alive.
    pub keep_alive: Option<Duration>,
    /// Limit on the TCP connect plus handshake.
    pub connection_timeout: Duration,
}

impl WebSocketConfig {
    /// Create a configuration for `url` without keep-alive.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            keep_alive: None,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    /// Add a custom header for the WebSocket handshake.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add multiple headers.
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Ping the server every `interval` while connected.
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = Some(interval);
        self
    }

    /// Set the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Current state of a [`WebSocketTransport`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WebSocketState {
    /// `connect` has not been called.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Connected; frames can be sent.
    Connected,
    /// Closed locally or remotely. The transport cannot be reused.
    Closed,
}

/// Command sent to the connection task.
enum Command {
    SendText(String),
    Close,
}

#[derive(Default)]
struct Connection {
    state: WebSocketState,
    command_tx: Option<mpsc::UnboundedSender<Command>>,
}

struct Shared {
    connection: Mutex<Connection>,
    task: Mutex<Option<JoinHandle<()>>>,
    events: Arc<TransportEvents>,
}

impl Shared {
    /// Move to `Closed` and emit `closed`, once.
    fn finish(&self) {
        let newly_closed = {
            let mut connection = self.connection.lock();
            connection.command_tx = None;
            if connection.state == WebSocketState::Closed {
                false
            } else {
                connection.state = WebSocketState::Closed;
                true
            }
        };
        if newly_closed {
            self.events.closed.emit(());
        }
    }

    fn fail(&self, error: NetworkError) {
        tracing::debug!(target: targets::TRANSPORT, error = %error, "websocket failed");
        self.events.error.emit(error.to_string());
        self.finish();
    }
}

/// A [`Transport`] over a `graphql-transport-ws` WebSocket.
///
/// The connection runs on a tokio task spawned by [`connect`](Transport::connect),
/// which therefore has to be called from within a tokio runtime. Outside a
/// runtime the transport reports an error and closes.
///
/// The handshake requests the `graphql-transport-ws` subprotocol. Inbound text
/// frames are emitted on `message_received`; binary frames are emitted too if
/// they hold valid UTF-8. With keep-alive enabled a WebSocket ping frame is
/// sent at every interval until the socket closes.
///
/// A transport connects at most once. Dropping it closes the socket.
pub struct WebSocketTransport {
    config: WebSocketConfig,
    shared: Arc<Shared>,
}

impl WebSocketTransport {
    /// Create a transport. Nothing happens until `connect` is called.
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                connection: Mutex::new(Connection::default()),
                task: Mutex::new(None),
                events: Arc::new(TransportEvents::new()),
            }),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> WebSocketState {
        self.shared.connection.lock().state
    }

    /// Get the URL this transport connects to.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Build the handshake request with the subprotocol and custom headers.
    fn build_request(config: &WebSocketConfig) -> Result<Request> {
        let mut request = config
            .url
            .as_str()
            .into_client_request()
            .map_err(NetworkError::from)?;

        let headers = request.headers_mut();
        headers.insert(
            http::header::SEC_WEBSOCKET_PROTOCOL,
            http::header::HeaderValue::from_static(SUBPROTOCOL),
        );
        for (name, value) in &config.headers {
            let header_name = http::header::HeaderName::try_from(name.as_str())?;
            let header_value = http::header::HeaderValue::try_from(value.as_str())?;
            headers.insert(header_name, header_value);
        }

        Ok(request)
    }

    async fn run(config: WebSocketConfig, shared: Arc<Shared>) {
        let request = match Self::build_request(&config) {
            Ok(request) => request,
            Err(e) => {
                shared.fail(e);
                return;
            }
        };

        let connect = tokio_tungstenite::connect_async(request);
        let ws_stream = match tokio::time::timeout(config.connection_timeout, connect).await {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                shared.fail(e.into());
                return;
            }
            Err(_) => {
                shared.fail(NetworkError::Timeout);
                return;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        {
            let mut connection = shared.connection.lock();
            if connection.state == WebSocketState::Closed {
                // Closed while the handshake was in flight.
                return;
            }
            connection.state = WebSocketState::Connected;
            connection.command_tx = Some(tx);
        }
        tracing::debug!(target: targets::TRANSPORT, url = %config.url, "websocket connected");
        shared.events.opened.emit(());

        let (mut write, mut read) = ws_stream.split();
        let mut keep_alive = config
            .keep_alive
            .filter(|interval| !interval.is_zero())
            .map(|interval| {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });

        loop {
            tokio::select! {
                command = rx.recv() => {
                    match command {
                        Some(Command::SendText(text)) => {
                            if let Err(e) = write.send(Message::Text(text.into())).await {
                                shared.events.error.emit(NetworkError::from(e).to_string());
                                break;
                            }
                        }
                        Some(Command::Close) | None => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }

                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            shared.events.message_received.emit(text.to_string());
                        }
                        Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                            Ok(text) => shared.events.message_received.emit(text),
                            Err(_) => {
                                tracing::debug!(
                                    target: targets::TRANSPORT,
                                    len = data.len(),
                                    "dropping non UTF-8 binary frame"
                                );
                            }
                        },
                        Some(Ok(Message::Close(frame))) => {
                            tracing::debug!(target: targets::TRANSPORT, ?frame, "server closed connection");
                            break;
                        }
                        // Pongs are sent by tungstenite; raw frames are not surfaced.
                        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            shared.events.error.emit(NetworkError::from(e).to_string());
                            break;
                        }
                        None => break,
                    }
                }

                _ = tick(&mut keep_alive) => {
                    tracing::trace!(target: targets::TRANSPORT, "keep-alive ping");
                    if let Err(e) = write.send(Message::Ping(Vec::new().into())).await {
                        shared.events.error.emit(NetworkError::from(e).to_string());
                        break;
                    }
                }
            }
        }

        shared.finish();
    }
}

/// Wait for the next keep-alive tick, or forever if keep-alive is off.
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl Transport for WebSocketTransport {
    fn events(&self) -> Arc<TransportEvents> {
        self.shared.events.clone()
    }

    fn connect(&self) {
        {
            let mut connection = self.shared.connection.lock();
            if connection.state != WebSocketState::Idle {
                return;
            }
            connection.state = WebSocketState::Connecting;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                self.shared
                    .fail(NetworkError::Connection(format!("no tokio runtime: {e}")));
                return;
            }
        };

        tracing::debug!(target: targets::TRANSPORT, url = %self.config.url, "connecting websocket");
        let task = runtime.spawn(Self::run(self.config.clone(), self.shared.clone()));
        *self.shared.task.lock() = Some(task);
    }

    fn send(&self, text: String) -> graphql_subscriber_core::Result<()> {
        let connection = self.shared.connection.lock();
        match connection.command_tx.as_ref() {
            Some(tx) => tx
                .send(Command::SendText(text))
                .map_err(|_| SubscriberError::NotConnected),
            None => Err(SubscriberError::NotConnected),
        }
    }

    fn close(&self) {
        let command_tx = {
            let mut connection = self.shared.connection.lock();
            if connection.state == WebSocketState::Closed {
                return;
            }
            connection.state = WebSocketState::Closed;
            connection.command_tx.take()
        };

        match command_tx {
            // The task sends a close frame and exits.
            Some(tx) => {
                let _ = tx.send(Command::Close);
            }
            // Still handshaking, or never started.
            None => {
                if let Some(task) = self.shared.task.lock().take() {
                    task.abort();
                }
            }
        }
        self.shared.events.closed.emit(());
    }

    fn is_ready(&self) -> bool {
        self.state() == WebSocketState::Connected
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_request_carries_subprotocol_and_headers() {
        let config = WebSocketConfig::new("ws://localhost:4000/graphql")
            .header("Authorization", "Bearer token");
        let request = WebSocketTransport::build_request(&config).unwrap();

        assert_eq!(
            request.headers().get(http::header::SEC_WEBSOCKET_PROTOCOL).unwrap(),
            "graphql-transport-ws"
        );
        assert_eq!(request.headers().get("authorization").unwrap(), "Bearer token");
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let config = WebSocketConfig::new("ws://localhost/graphql").header("bad header", "x");
        assert!(matches!(
            WebSocketTransport::build_request(&config),
            Err(NetworkError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_send_before_connect() {
        let transport = WebSocketTransport::new(WebSocketConfig::new("ws://localhost/graphql"));
        assert_eq!(transport.state(), WebSocketState::Idle);
        assert!(!transport.is_ready());
        assert_eq!(
            transport.send("{}".to_string()),
            Err(SubscriberError::NotConnected)
        );
    }

    #[test]
    fn test_close_emits_once() {
        let transport = WebSocketTransport::new(WebSocketConfig::new("ws://localhost/graphql"));
        let closed = Arc::new(AtomicUsize::new(0));
        let closed_clone = closed.clone();
        transport.events().closed.connect(move |_| {
            closed_clone.fetch_add(1, Ordering::SeqCst);
        });

        transport.close();
        transport.close();
        transport.connect();
        drop(transport);

        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_connect_outside_runtime_fails() {
        let transport = WebSocketTransport::new(WebSocketConfig::new("ws://localhost/graphql"));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = errors.clone();
        transport.events().error.connect(move |message: &String| {
            errors_clone.lock().push(message.clone());
        });

        transport.connect();

        assert_eq!(transport.state(), WebSocketState::Closed);
        assert_eq!(errors.lock().len(), 1);
        assert!(errors.lock()[0].contains("no tokio runtime"));
    }
}
