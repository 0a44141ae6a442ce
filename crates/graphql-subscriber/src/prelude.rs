//! Prelude module for graphql-subscriber.
//!
//! ```ignore
//! use graphql_subscriber::prelude::*;
//! ```

pub use crate::{
    ConnectionState, Fingerprint, FingerprintStrategy, LogCategory, LogSeverity, Logger,
    SubscribeRequest, SubscriberError, SubscriptionManager, Transport,
};

#[cfg(feature = "networking")]
pub use crate::net::{NetworkError, SubscriberConfig, WebSocketTransport};
