//! Local subscriber bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::fingerprint::Fingerprint;

/// A callback invoked with every `next` or `error` payload of a subscription.
pub type SubscriberCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Fingerprint -> callbacks, in registration order.
///
/// Entries are additive: callbacks are never removed individually.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: HashMap<Fingerprint, Vec<SubscriberCallback>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to the list for `fingerprint`, creating the list if absent.
    pub fn add(&mut self, fingerprint: Fingerprint, callback: SubscriberCallback) {
        self.subscribers.entry(fingerprint).or_default().push(callback);
    }

    /// Snapshot of the callbacks for `id`, in registration order.
    ///
    /// The snapshot lets callers invoke the callbacks without holding any
    /// lock around the registry.
    pub fn callbacks(&self, id: &str) -> Vec<SubscriberCallback> {
        self.subscribers.get(id).cloned().unwrap_or_default()
    }

    /// Number of callbacks registered for `id`.
    pub fn count(&self, id: &str) -> usize {
        self.subscribers.get(id).map_or(0, Vec::len)
    }

    /// Number of distinct fingerprints with at least one callback.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.subscribers.iter().map(|(k, v)| (k.as_str(), v.len())))
            .finish()
    }
}

/// Fingerprints that currently have a live subscription on the server.
#[derive(Debug, Default)]
pub struct ServerSubscriptionSet {
    active: HashSet<Fingerprint>,
}

impl ServerSubscriptionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `fingerprint` active. Returns `false` if it already was.
    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        self.active.insert(fingerprint)
    }

    /// Forget `id`. Returns whether it was active.
    pub fn remove(&mut self, id: &str) -> bool {
        self.active.remove(id)
    }

    /// Whether `id` is active.
    pub fn contains(&self, id: &str) -> bool {
        self.active.contains(id)
    }

    /// Active fingerprints, sorted.
    pub fn to_vec(&self) -> Vec<Fingerprint> {
        let mut active: Vec<_> = self.active.iter().cloned().collect();
        active.sort();
        active
    }

    /// Number of active fingerprints.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no subscription is active.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> SubscriberCallback {
        let log = log.clone();
        Arc::new(move |payload: &Value| log.lock().push(format!("{name}:{payload}")))
    }

    #[test]
    fn test_callbacks_keep_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SubscriberRegistry::new();
        registry.add(Fingerprint::new("a"), recorder(&log, "first"));
        registry.add(Fingerprint::new("a"), recorder(&log, "second"));
        registry.add(Fingerprint::new("b"), recorder(&log, "other"));

        for callback in registry.callbacks("a") {
            callback(&Value::from(1));
        }

        assert_eq!(*log.lock(), vec!["first:1", "second:1"]);
        assert_eq!(registry.count("a"), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_id_has_no_callbacks() {
        let registry = SubscriberRegistry::new();
        assert!(registry.callbacks("missing").is_empty());
        assert_eq!(registry.count("missing"), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_server_set_insert_once() {
        let mut set = ServerSubscriptionSet::new();
        assert!(set.insert(Fingerprint::new("a")));
        assert!(!set.insert(Fingerprint::new("a")));
        assert!(set.contains("a"));

        assert!(set.remove("a"));
        assert!(!set.remove("a"));
        assert!(set.insert(Fingerprint::new("a")));
        assert_eq!(set.to_vec(), vec![Fingerprint::new("a")]);
    }
}
