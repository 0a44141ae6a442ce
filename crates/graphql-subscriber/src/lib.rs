//! graphql-subscriber - multiplexed GraphQL subscriptions over one
//! graphql-transport-ws connection.
//!
//! This is the umbrella crate that re-exports the public APIs of the
//! workspace.
//!
//! # Example
//!
//! ```no_run
//! use graphql_subscriber::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = graphql_subscriber::net::connect(
//!     SubscriberConfig::new("wss://api.example.com/graphql").port(443),
//! )?;
//! manager.wait_until_ready().await?;
//!
//! let request = SubscribeRequest::new("OnPrice", "subscription { price }")
//!     .variable("currency", "EUR");
//! manager.subscribe(request, |payload| println!("{payload}"));
//! # Ok(())
//! # }
//! ```

pub use graphql_subscriber_core::*;

/// WebSocket transport and the `connect` constructor.
#[cfg(feature = "networking")]
pub mod net {
    pub use graphql_subscriber_net::*;
}

pub mod prelude;
