//! In-process transport driven by hand.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{Transport, TransportEvents};
use crate::error::{Result, SubscriberError};
use crate::logging::targets;

#[derive(Debug, Default)]
struct MemoryState {
    connect_requested: bool,
    open: bool,
    closed: bool,
    sent: Vec<String>,
}

/// A transport whose socket side is simulated by the caller.
///
/// `connect()` only records the request; call [`open`](Self::open),
/// [`receive`](Self::receive), [`fail`](Self::fail) and
/// [`disconnect`](Self::disconnect) to play the server. Frames passed to
/// `send` are kept and can be inspected with [`sent`](Self::sent).
///
/// Cloning yields another handle to the same socket.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    events: Arc<TransportEvents>,
}

impl MemoryTransport {
    /// Create a transport that is not yet open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `connect()` has been called.
    pub fn connect_requested(&self) -> bool {
        self.state.lock().connect_requested
    }

    /// Open the socket and emit `opened`.
    pub fn open(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.open = true;
        }
        self.events.opened.emit(());
    }

    /// Deliver an inbound text frame.
    pub fn receive(&self, text: impl Into<String>) {
        self.events.message_received.emit(text.into());
    }

    /// Report a socket error.
    pub fn fail(&self, message: impl Into<String>) {
        self.events.error.emit(message.into());
    }

    /// Close the socket from the remote side.
    pub fn disconnect(&self) {
        if self.mark_closed() {
            self.events.closed.emit(());
        }
    }

    /// Every frame sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Sent frames decoded as JSON. Frames that fail to parse are skipped.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.state
            .lock()
            .sent
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Forget the frames sent so far.
    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    /// Whether the socket has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn mark_closed(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.open = false;
        state.closed = true;
        true
    }
}

impl Transport for MemoryTransport {
    fn events(&self) -> Arc<TransportEvents> {
        self.events.clone()
    }

    fn connect(&self) {
        self.state.lock().connect_requested = true;
    }

    fn send(&self, text: String) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(SubscriberError::NotConnected);
        }
        tracing::trace!(target: targets::TRANSPORT, frame = %text, "memory transport send");
        state.sent.push(text);
        Ok(())
    }

    fn close(&self) {
        if self.mark_closed() {
            self.events.closed.emit(());
        }
    }

    fn is_ready(&self) -> bool {
        self.state.lock().open
    }
}
