//! Configuration for connecting a subscription manager to a GraphQL endpoint.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use graphql_subscriber_core::{FingerprintStrategy, Logger, RawFingerprint};
use serde_json::Value;
use url::Url;

use crate::error::{NetworkError, Result};
use crate::websocket::WebSocketConfig;

/// Default interval between keep-alive pings.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Default limit on the WebSocket handshake.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything [`connect`](crate::connect) needs to reach a GraphQL endpoint.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use graphql_subscriber_net::SubscriberConfig;
///
/// let config = SubscriberConfig::new("wss://api.example.com/graphql")
///     .port(8443)
///     .keep_alive_interval(Duration::from_secs(20))
///     .header("Authorization", "Bearer token");
///
/// assert_eq!(config.full_url().unwrap().as_str(), "wss://api.example.com:8443/graphql");
/// ```
#[derive(Clone)]
pub struct SubscriberConfig {
    /// The endpoint URL (ws:// or wss://).
    pub url: String,
    /// Overrides the port in `url` when set.
    pub port: Option<u16>,
    /// Extra headers sent with the WebSocket handshake.
    pub headers: HashMap<String, String>,
    /// Whether the transport pings the server periodically.
    pub keep_alive: bool,
    /// Interval between keep-alive pings.
    pub keep_alive_interval: Duration,
    /// Limit on establishing the WebSocket connection.
    pub connection_timeout: Duration,
    /// Payload of the `connection_init` frame.
    pub init_payload: Value,
    logger: Option<Arc<dyn Logger>>,
    fingerprints: Option<Arc<dyn FingerprintStrategy>>,
}

impl SubscriberConfig {
    /// Create a configuration for `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            port: None,
            headers: HashMap::new(),
            keep_alive: true,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            init_payload: Value::Object(Default::default()),
            logger: None,
            fingerprints: None,
        }
    }

    /// Connect to `port` instead of the one in the URL.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
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

    /// Enable or disable keep-alive pings.
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    /// Set the keep-alive interval.
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set the handshake timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the `connection_init` payload, e.g. credentials.
    pub fn init_payload(mut self, payload: Value) -> Self {
        self.init_payload = payload;
        self
    }

    /// Report protocol events to `logger` instead of `tracing`.
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Derive subscription ids with `strategy`.
    pub fn fingerprint_strategy(mut self, strategy: impl FingerprintStrategy + 'static) -> Self {
        self.fingerprints = Some(Arc::new(strategy));
        self
    }

    /// Use the unhashed operation name and query as subscription ids.
    pub fn raw_fingerprints(self) -> Self {
        self.fingerprint_strategy(RawFingerprint)
    }

    /// The configured logger, if any.
    pub fn shared_logger(&self) -> Option<Arc<dyn Logger>> {
        self.logger.clone()
    }

    /// The configured fingerprint strategy, if any.
    pub fn shared_fingerprint_strategy(&self) -> Option<Arc<dyn FingerprintStrategy>> {
        self.fingerprints.clone()
    }

    /// The URL with the port override applied.
    pub fn full_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url)?;
        if let Some(port) = self.port {
            url.set_port(Some(port))
                .map_err(|()| NetworkError::InvalidUrl(format!("cannot set a port on {}", self.url)))?;
        }
        Ok(url)
    }

    /// Transport settings derived from this configuration.
    pub fn websocket_config(&self) -> Result<WebSocketConfig> {
        let mut config = WebSocketConfig::new(self.full_url()?)
            .headers(self.headers.clone())
            .connection_timeout(self.connection_timeout);
        if self.keep_alive {
            config = config.keep_alive(self.keep_alive_interval);
        }
        Ok(config)
    }
}

impl fmt::Debug for SubscriberConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberConfig")
            .field("url", &self.url)
            .field("port", &self.port)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("keep_alive", &self.keep_alive)
            .field("keep_alive_interval", &self.keep_alive_interval)
            .field("connection_timeout", &self.connection_timeout)
            .field("custom_logger", &self.logger.is_some())
            .field("custom_fingerprints", &self.fingerprints.is_some())
            .finish()
    }
}
