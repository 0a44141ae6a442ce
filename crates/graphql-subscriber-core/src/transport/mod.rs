//! The socket capability the subscription manager runs on.
//!
//! A [`Transport`] connects, sends text frames, closes, and reports whether
//! it can currently send. Everything it observes on the socket is announced
//! through the [`TransportEvents`] signals. The manager never needs to know
//! which implementation it drives.
//!
//! Implementations in this workspace:
//!
//! - [`MemoryTransport`]: in-process, driven by hand; useful for tests and
//!   embedding behind a custom socket.
//! - `WebSocketTransport` in `graphql-subscriber-net`: tokio-tungstenite.

mod memory;

use std::sync::Arc;

use crate::error::Result;
use crate::signal::Signal;

pub use memory::MemoryTransport;

/// Signals a transport emits.
#[derive(Debug, Default)]
pub struct TransportEvents {
    /// Emitted when the socket is open and `send` may be used.
    pub opened: Signal<()>,
    /// Emitted for every inbound text frame.
    pub message_received: Signal<String>,
    /// Emitted when the socket reports an error.
    pub error: Signal<String>,
    /// Emitted once when the socket is closed.
    pub closed: Signal<()>,
}

impl TransportEvents {
    /// Create a set of signals with no connections.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A bidirectional text socket.
pub trait Transport: Send + Sync {
    /// Shared handle to the event signals.
    fn events(&self) -> Arc<TransportEvents>;

    /// Start connecting. Returns immediately; `opened` fires once connected.
    fn connect(&self);

    /// Queue a text frame for sending.
    fn send(&self, text: String) -> Result<()>;

    /// Close the socket.
    fn close(&self);

    /// Whether `send` currently succeeds.
    fn is_ready(&self) -> bool;
}
