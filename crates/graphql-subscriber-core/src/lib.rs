//! Core of graphql-subscriber.
//!
//! This crate multiplexes GraphQL subscriptions over a single
//! [graphql-transport-ws] connection:
//!
//! - **Fingerprinting**: requests are identified by operation name and
//!   whitespace-insensitive query text ([`FingerprintStrategy`])
//! - **Deduplication**: one `subscribe` frame per fingerprint, any number of
//!   local callbacks fanned out from it
//! - **Handshake**: `connection_init` on open; subscriptions are sent only
//!   after `connection_ack` ([`ConnectionController`])
//! - **Deferred subscriptions**: requests made before the acknowledgement are
//!   queued and flushed exactly once when it arrives ([`RetryQueue`])
//! - **Routing**: inbound frames dispatched by message type ([`MessageRouter`])
//!
//! The socket itself is abstracted as a [`Transport`]. The WebSocket
//! implementation lives in `graphql-subscriber-net`; [`MemoryTransport`] is an
//! in-process stand-in.
//!
//! # Example
//!
//! ```
//! use graphql_subscriber_core::{MemoryTransport, SubscribeRequest, SubscriptionManager};
//!
//! let transport = MemoryTransport::new();
//! let manager = SubscriptionManager::new(transport.clone());
//!
//! transport.open();
//! transport.receive(r#"{"type":"connection_ack"}"#);
//!
//! let request = SubscribeRequest::new(
//!     "parcelGetPriceDone",
//!     "subscription { parcelGetPriceDone { success data } }",
//! );
//! assert!(manager.subscribe(request.clone(), |payload| println!("first: {payload}")));
//! assert!(manager.subscribe(request, |payload| println!("second: {payload}")));
//!
//! // Two callbacks, one server subscription.
//! assert_eq!(manager.subscriber_count(), 2);
//! assert_eq!(manager.active_subscriptions().len(), 1);
//! ```
//!
//! [graphql-transport-ws]: https://github.com/enisdenjo/graphql-ws/blob/master/PROTOCOL.md

mod connection;
mod error;
mod fingerprint;
pub mod logging;
mod manager;
pub mod protocol;
mod registry;
mod request;
mod retry;
mod router;
mod signal;
pub mod transport;

pub use connection::{ConnectionController, ConnectionState};
pub use error::{Result, SubscriberError};
pub use fingerprint::{
    Fingerprint, FingerprintStrategy, HashedFingerprint, RawFingerprint, normalized_key,
};
pub use logging::{LogCategory, LogSeverity, Logger, NoopLogger, TracingLogger};
pub use manager::{SubscriptionManager, SubscriptionManagerBuilder};
pub use registry::{ServerSubscriptionSet, SubscriberCallback, SubscriberRegistry};
pub use request::SubscribeRequest;
pub use retry::{QueuedSubscription, RetryQueue};
pub use router::{MessageHandler, MessageRouter};
pub use signal::{ConnectionId, Signal};
pub use transport::{MemoryTransport, Transport, TransportEvents};
