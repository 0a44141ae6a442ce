//! WebSocket transport for graphql-subscriber.
//!
//! [`WebSocketTransport`] implements the core [`Transport`] trait on top of
//! `tokio-tungstenite`, and [`connect`] wires it to a
//! [`SubscriptionManager`] from a [`SubscriberConfig`].
//!
//! # Example
//!
//! ```no_run
//! use graphql_subscriber_core::SubscribeRequest;
//! use graphql_subscriber_net::{SubscriberConfig, connect};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = connect(
//!     SubscriberConfig::new("wss://api.example.com/graphql")
//!         .header("Authorization", "Bearer token"),
//! )?;
//! manager.wait_until_ready().await?;
//!
//! let request = SubscribeRequest::new(
//!     "parcelGetPriceDone",
//!     "subscription { parcelGetPriceDone { success data } }",
//! );
//! manager.subscribe(request, |payload| println!("{payload}"));
//! # Ok(())
//! # }
//! ```
//!
//! [`Transport`]: graphql_subscriber_core::Transport

pub mod config;
pub mod error;
pub mod websocket;

use graphql_subscriber_core::SubscriptionManager;

pub use config::{DEFAULT_CONNECTION_TIMEOUT, DEFAULT_KEEP_ALIVE_INTERVAL, SubscriberConfig};
pub use error::{NetworkError, Result};
pub use websocket::{WebSocketConfig, WebSocketState, WebSocketTransport};

/// Create a manager for the endpoint in `config` and start connecting.
///
/// Must be called from within a tokio runtime. Fails only if the URL or port
/// is invalid; connection problems are reported to the configured logger and
/// surface through [`SubscriptionManager::wait_until_ready`].
pub fn connect(config: SubscriberConfig) -> Result<SubscriptionManager> {
    let transport = WebSocketTransport::new(config.websocket_config()?);

    let mut builder =
        SubscriptionManager::builder(transport).init_payload(config.init_payload.clone());
    if let Some(logger) = config.shared_logger() {
        builder = builder.shared_logger(logger);
    }
    if let Some(strategy) = config.shared_fingerprint_strategy() {
        builder = builder.shared_fingerprint_strategy(strategy);
    }
    Ok(builder.build())
}
