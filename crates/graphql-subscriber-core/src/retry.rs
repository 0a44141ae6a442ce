//! Subscriptions requested before the connection was acknowledged.

use std::collections::HashMap;

use crate::fingerprint::Fingerprint;
use crate::registry::SubscriberCallback;
use crate::request::SubscribeRequest;

/// A deferred subscription.
pub struct QueuedSubscription {
    /// Fingerprint the entry is stored under.
    pub fingerprint: Fingerprint,
    /// The request of the most recent enqueue for this fingerprint.
    pub request: SubscribeRequest,
    /// Every callback queued under this fingerprint, oldest first.
    pub callbacks: Vec<SubscriberCallback>,
}

impl std::fmt::Debug for QueuedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedSubscription")
            .field("fingerprint", &self.fingerprint)
            .field("request", &self.request)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Keyed queue of deferred subscriptions.
///
/// One entry per fingerprint. A second enqueue for a queued fingerprint
/// replaces the stored request and appends its callback, so every caller is
/// registered once the queue is drained.
#[derive(Debug, Default)]
pub struct RetryQueue {
    entries: HashMap<Fingerprint, QueuedSubscription>,
    order: Vec<Fingerprint>,
}

impl RetryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the entry for `fingerprint`.
    pub fn enqueue(
        &mut self,
        fingerprint: Fingerprint,
        request: SubscribeRequest,
        callback: SubscriberCallback,
    ) {
        match self.entries.get_mut(&fingerprint) {
            Some(entry) => {
                entry.request = request;
                entry.callbacks.push(callback);
            }
            None => {
                self.order.push(fingerprint.clone());
                self.entries.insert(
                    fingerprint.clone(),
                    QueuedSubscription {
                        fingerprint,
                        request,
                        callbacks: vec![callback],
                    },
                );
            }
        }
    }

    /// Remove and return every entry, in first-enqueue order.
    pub fn drain(&mut self) -> Vec<QueuedSubscription> {
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|fingerprint| self.entries.remove(&fingerprint))
            .collect()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Whether `id` is queued.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of queued fingerprints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
