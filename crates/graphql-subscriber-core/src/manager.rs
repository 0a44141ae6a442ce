//! The subscription manager.
//!
//! [`SubscriptionManager`] multiplexes any number of local subscribers over
//! one graphql-transport-ws connection. Subscribers whose requests share a
//! [`Fingerprint`] share a single server-side subscription: the `subscribe`
//! frame is sent once and every inbound `next`/`error` payload is fanned out
//! to all of them in registration order.
//!
//! # Example
//!
//! ```
//! use graphql_subscriber_core::{MemoryTransport, SubscribeRequest, SubscriptionManager};
//!
//! let transport = MemoryTransport::new();
//! let manager = SubscriptionManager::new(transport.clone());
//!
//! // Not acknowledged yet: the request is queued.
//! let accepted = manager.subscribe(
//!     SubscribeRequest::new("OnPrice", "subscription { price }"),
//!     |payload| println!("price update: {payload}"),
//! );
//! assert!(!accepted);
//!
//! transport.open();
//! transport.receive(r#"{"type":"connection_ack"}"#);
//!
//! // The queued request was flushed on acknowledgement.
//! assert_eq!(manager.active_subscriptions().len(), 1);
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;

use crate::connection::{ConnectionController, ConnectionState};
use crate::error::Result;
use crate::fingerprint::{Fingerprint, FingerprintStrategy, HashedFingerprint};
use crate::logging::{LogCategory, LogSeverity, Logger, TracingLogger, targets};
use crate::protocol::{ClientMessage, SubscribePayload};
use crate::registry::{ServerSubscriptionSet, SubscriberCallback, SubscriberRegistry};
use crate::request::SubscribeRequest;
use crate::retry::RetryQueue;
use crate::router::{MessageHandler, MessageRouter};
use crate::signal::ConnectionId;
use crate::transport::{Transport, TransportEvents};

/// Bookkeeping shared by every subscribe call and inbound frame.
#[derive(Debug, Default)]
struct SubscriptionState {
    registry: SubscriberRegistry,
    server: ServerSubscriptionSet,
    retry: RetryQueue,
    subscriber_count: usize,
}

/// What `subscribe` decided while holding the state lock.
enum Admission {
    Rejected,
    Queued,
    Joined,
    Send(Fingerprint, ClientMessage),
}

struct ManagerInner {
    controller: ConnectionController,
    router: MessageRouter,
    fingerprints: Arc<dyn FingerprintStrategy>,
    logger: Arc<dyn Logger>,
    state: Mutex<SubscriptionState>,
    events: Arc<TransportEvents>,
    slots: Mutex<Vec<SlotHandle>>,
}

enum SlotHandle {
    Opened(ConnectionId),
    Message(ConnectionId),
    Error(ConnectionId),
    Closed(ConnectionId),
}

impl ManagerInner {
    fn subscribe(&self, request: SubscribeRequest, callback: SubscriberCallback) -> bool {
        let fingerprint = self
            .fingerprints
            .fingerprint(&request.operation_name, &request.query);

        let admission = {
            let mut state = self.state.lock();
            if self.controller.state() == ConnectionState::Terminated {
                Admission::Rejected
            } else if !self.controller.is_ready() {
                state.retry.enqueue(fingerprint.clone(), request, callback);
                Admission::Queued
            } else {
                state.registry.add(fingerprint.clone(), callback);
                state.subscriber_count += 1;
                if state.server.insert(fingerprint.clone()) {
                    let frame = ClientMessage::Subscribe {
                        id: fingerprint.to_string(),
                        payload: SubscribePayload::from(&request),
                    };
                    Admission::Send(fingerprint.clone(), frame)
                } else {
                    Admission::Joined
                }
            }
        };

        match admission {
            Admission::Rejected => {
                self.logger.log(
                    LogSeverity::Warning,
                    LogCategory::System,
                    "Subscription rejected: connection closed",
                    Some(&Value::String(fingerprint.into_string())),
                );
                false
            }
            Admission::Queued => {
                tracing::debug!(
                    target: targets::MANAGER,
                    fingerprint = %fingerprint,
                    "connection not ready, subscription queued"
                );
                false
            }
            Admission::Joined => {
                tracing::debug!(
                    target: targets::MANAGER,
                    fingerprint = %fingerprint,
                    "joined existing server subscription"
                );
                true
            }
            Admission::Send(fingerprint, frame) => {
                if let Err(e) = self.controller.send(&frame) {
                    self.state.lock().server.remove(fingerprint.as_str());
                    self.logger.log(
                        LogSeverity::Error,
                        LogCategory::System,
                        "Could not send subscription",
                        Some(&serde_json::json!({
                            "id": fingerprint.as_str(),
                            "error": e.to_string(),
                        })),
                    );
                }
                true
            }
        }
    }

    fn disconnect_slots(&self) {
        for slot in self.slots.lock().drain(..) {
            match slot {
                SlotHandle::Opened(id) => self.events.opened.disconnect(id),
                SlotHandle::Message(id) => self.events.message_received.disconnect(id),
                SlotHandle::Error(id) => self.events.error.disconnect(id),
                SlotHandle::Closed(id) => self.events.closed.disconnect(id),
            };
        }
    }
}

impl MessageHandler for ManagerInner {
    fn on_ack(&self) {
        let queued = {
            let mut state = self.state.lock();
            if !self.controller.acknowledge() {
                return;
            }
            // Entries resubmitted to a dead transport would only be queued again.
            if !self.controller.is_ready() {
                return;
            }
            state.retry.drain()
        };

        if !queued.is_empty() {
            tracing::debug!(
                target: targets::MANAGER,
                queued = queued.len(),
                "flushing queued subscriptions"
            );
        }
        for entry in queued {
            for callback in entry.callbacks {
                self.subscribe(entry.request.clone(), callback);
            }
        }
    }

    fn on_next(&self, id: &str, payload: &Value) {
        let callbacks = self.state.lock().registry.callbacks(id);
        for callback in callbacks {
            callback(payload);
        }
    }

    fn on_complete(&self, id: &str) {
        let removed = self.state.lock().server.remove(id);
        tracing::debug!(target: targets::MANAGER, id, removed, "server subscription completed");
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.disconnect_slots();
        self.controller.terminate();
    }
}

/// Multiplexes GraphQL subscriptions over one transport connection.
///
/// Construction connects the transport. Cloning yields another handle to the
/// same manager; the connection is terminated when the last handle is
/// dropped or [`close`](Self::close) is called.
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<ManagerInner>,
}

impl SubscriptionManager {
    /// Create a manager over `transport` with default settings and connect it.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::builder(transport).build()
    }

    /// Start configuring a manager over `transport`.
    pub fn builder(transport: impl Transport + 'static) -> SubscriptionManagerBuilder {
        SubscriptionManagerBuilder::new(Arc::new(transport))
    }

    /// Subscribe `callback` to `request`.
    ///
    /// Returns `true` if the subscription is live, either because a
    /// `subscribe` frame was sent or because an identical subscription was
    /// already active. Returns `false` if the connection is not acknowledged
    /// yet (the request is queued and flushed on acknowledgement) or the
    /// manager was closed (the request is dropped).
    pub fn subscribe<F>(&self, request: SubscribeRequest, callback: F) -> bool
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.subscribe(request, Arc::new(callback))
    }

    /// Terminate the connection. Queued subscriptions are discarded and
    /// later calls to [`subscribe`](Self::subscribe) return `false`.
    pub fn close(&self) {
        self.inner.controller.terminate();
        self.inner.state.lock().retry.clear();
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.controller.state()
    }

    /// Whether subscriptions are sent immediately.
    pub fn is_ready(&self) -> bool {
        self.inner.controller.is_ready()
    }

    /// Resolve once the connection is acknowledged.
    pub async fn wait_until_ready(&self) -> Result<()> {
        self.inner.controller.wait_until_ready().await
    }

    /// The fingerprint `request` maps to.
    pub fn fingerprint(&self, request: &SubscribeRequest) -> Fingerprint {
        self.inner
            .fingerprints
            .fingerprint(&request.operation_name, &request.query)
    }

    /// Number of callbacks registered since construction.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscriber_count
    }

    /// Number of callbacks registered for `fingerprint`.
    pub fn subscribers_for(&self, fingerprint: &Fingerprint) -> usize {
        self.inner.state.lock().registry.count(fingerprint.as_str())
    }

    /// Fingerprints with a live server subscription, sorted.
    pub fn active_subscriptions(&self) -> Vec<Fingerprint> {
        self.inner.state.lock().server.to_vec()
    }

    /// Number of fingerprints waiting for the connection.
    pub fn queued_count(&self) -> usize {
        self.inner.state.lock().retry.len()
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SubscriptionManager")
            .field("connection", &self.inner.controller.state())
            .field("subscribers", &state.subscriber_count)
            .field("active", &state.server.len())
            .field("queued", &state.retry.len())
            .finish()
    }
}

/// Builder for [`SubscriptionManager`].
pub struct SubscriptionManagerBuilder {
    transport: Arc<dyn Transport>,
    logger: Arc<dyn Logger>,
    fingerprints: Arc<dyn FingerprintStrategy>,
    init_payload: Value,
}

impl SubscriptionManagerBuilder {
    /// Start from defaults: [`TracingLogger`], [`HashedFingerprint`] and an
    /// empty `connection_init` payload.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            logger: Arc::new(TracingLogger),
            fingerprints: Arc::new(HashedFingerprint),
            init_payload: Value::Object(Default::default()),
        }
    }

    /// Report protocol events to `logger`.
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Share an existing logger.
    pub fn shared_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Derive fingerprints with `strategy`.
    pub fn fingerprint_strategy(mut self, strategy: impl FingerprintStrategy + 'static) -> Self {
        self.fingerprints = Arc::new(strategy);
        self
    }

    /// Share an existing fingerprint strategy.
    pub fn shared_fingerprint_strategy(mut self, strategy: Arc<dyn FingerprintStrategy>) -> Self {
        self.fingerprints = strategy;
        self
    }

    /// Payload of the `connection_init` frame (e.g. auth tokens).
    pub fn init_payload(mut self, payload: Value) -> Self {
        self.init_payload = payload;
        self
    }

    /// Build the manager and connect the transport.
    pub fn build(self) -> SubscriptionManager {
        let events = self.transport.events();
        let inner = Arc::new(ManagerInner {
            controller: ConnectionController::new(
                self.transport,
                self.init_payload,
                self.logger.clone(),
            ),
            router: MessageRouter::new(self.logger.clone()),
            fingerprints: self.fingerprints,
            logger: self.logger,
            state: Mutex::new(SubscriptionState::default()),
            events: events.clone(),
            slots: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&inner);
        let slots = vec![
            SlotHandle::Opened(events.opened.connect(with_inner(&weak, |inner, _: &()| {
                inner.controller.handle_open();
            }))),
            SlotHandle::Message(events.message_received.connect(with_inner(
                &weak,
                |inner, text: &String| {
                    inner.router.route(text, inner);
                },
            ))),
            SlotHandle::Error(events.error.connect(with_inner(&weak, |inner, message: &String| {
                inner.controller.handle_error(message);
            }))),
            SlotHandle::Closed(events.closed.connect(with_inner(&weak, |inner, _: &()| {
                inner.controller.handle_close();
            }))),
        ];
        *inner.slots.lock() = slots;

        inner.controller.connect();
        SubscriptionManager { inner }
    }
}

/// Wrap a slot so it runs only while the manager is alive.
fn with_inner<Args, F>(weak: &Weak<ManagerInner>, slot: F) -> impl Fn(&Args) + Send + Sync + 'static
where
    Args: 'static,
    F: Fn(&ManagerInner, &Args) + Send + Sync + 'static,
{
    let weak = weak.clone();
    move |args: &Args| {
        if let Some(inner) = weak.upgrade() {
            slot(&inner, args);
        }
    }
}
