//! Shared per-connection handler registry.
//!
//! Consumers register interest in a named event and may swap the handler
//! function at any time without the channel noticing: the connection is keyed
//! on the *set of event names* (see [`crate::supervisor`]), while the
//! registry is the mutable indirection that always holds the latest handler
//! for each slot. Dispatch reads the registry at delivery time, never a
//! snapshot captured when the subscription was created.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A side-effecting callback for one decoded payload. Handlers must be fast
/// and non-blocking; anything that needs I/O spawns its own task.
pub type Handler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Identifies one registered (event-name, handler) slot. Event names are not
/// unique across subscriptions — many consumers may watch the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionId {
    event: String,
    seq: u64,
}

impl SubscriptionId {
    pub fn event(&self) -> &str {
        &self.event
    }
}

struct Slot {
    seq: u64,
    handler: Handler,
}

#[derive(Default)]
pub struct HandlerRegistry {
    inner: RwLock<HashMap<String, Vec<Slot>>>,
    next_seq: AtomicU64,
}

impl HandlerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a handler for a named event. Handlers for the same name run
    /// in registration order.
    pub fn subscribe(&self, event: &str, handler: Handler) -> SubscriptionId {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(event.to_string())
            .or_default()
            .push(Slot { seq, handler });
        SubscriptionId {
            event: event.to_string(),
            seq,
        }
    }

    /// Swap the handler behind an existing subscription, keeping its position
    /// in dispatch order. Returns false if the subscription is gone.
    pub fn replace(&self, id: &SubscriptionId, handler: Handler) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let Some(slots) = guard.get_mut(&id.event) else {
            return false;
        };
        match slots.iter_mut().find(|slot| slot.seq == id.seq) {
            Some(slot) => {
                slot.handler = handler;
                true
            }
            None => false,
        }
    }

    /// Remove one subscription. Removing the last slot for a name shrinks the
    /// event-name set, which the supervisor treats as a reconnect trigger.
    pub fn unsubscribe(&self, id: &SubscriptionId) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(slots) = guard.get_mut(&id.event) {
            slots.retain(|slot| slot.seq != id.seq);
            if slots.is_empty() {
                guard.remove(&id.event);
            }
        }
    }

    /// Invoke every handler currently registered for `event`, in registration
    /// order, synchronously on the calling task. Returns how many ran.
    ///
    /// The slot list is cloned out before invocation so a handler may
    /// re-register or swap itself without deadlocking.
    pub fn dispatch(&self, event: &str, payload: &serde_json::Value) -> usize {
        let handlers: Vec<Handler> = {
            let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
            match guard.get(event) {
                Some(slots) => slots.iter().map(|s| Arc::clone(&s.handler)).collect(),
                None => Vec::new(),
            }
        };
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// The current set of subscribed event names, value-ordered. This is the
    /// derived key the supervisor compares to decide whether a reconnect is
    /// warranted.
    pub fn event_names(&self) -> BTreeSet<String> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Handler {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        Arc::new(move |_payload| log.lock().unwrap().push(tag.clone()))
    }

    #[test]
    fn dispatch_runs_in_registration_order() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.subscribe("tick", recording(&log, "first"));
        registry.subscribe("tick", recording(&log, "second"));
        let ran = registry.dispatch("tick", &json!({}));
        assert_eq!(ran, 2);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn replace_keeps_order_and_uses_latest_closure() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = registry.subscribe("tick", recording(&log, "a-old"));
        registry.subscribe("tick", recording(&log, "b"));
        assert!(registry.replace(&a, recording(&log, "a-new")));
        registry.dispatch("tick", &json!({}));
        assert_eq!(*log.lock().unwrap(), vec!["a-new", "b"]);
        // Replacing does not grow the name set.
        assert_eq!(registry.event_names().len(), 1);
    }

    #[test]
    fn unsubscribe_shrinks_name_set() {
        let registry = HandlerRegistry::new();
        let id = registry.subscribe("solo", Arc::new(|_| {}));
        assert!(registry.event_names().contains("solo"));
        registry.unsubscribe(&id);
        assert!(registry.event_names().is_empty());
        assert!(!registry.replace(&id, Arc::new(|_| {})));
    }

    #[test]
    fn unknown_event_dispatches_to_nobody() {
        let registry = HandlerRegistry::new();
        registry.subscribe("known", Arc::new(|_| {}));
        assert_eq!(registry.dispatch("unknown", &json!(null)), 0);
    }
}
