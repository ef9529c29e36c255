//! Flat listener set for a single value.

use crate::types::{Listener, ListenerId, Unsubscribe};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Internal listener table.
struct Listeners<T> {
    next_id: u64,
    entries: BTreeMap<ListenerId, Listener<T>>,
}

/// Ordered set of listeners for one value.
///
/// Listeners run in registration order. The set is copied before delivery,
/// so a listener may subscribe or unsubscribe (itself included) while being
/// notified.
pub struct Notifier<T> {
    listeners: Arc<Mutex<Listeners<T>>>,
}

impl<T: 'static> Notifier<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 1,
                entries: BTreeMap::new(),
            })),
        }
    }

    /// Register a listener. The returned handle removes it again.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Unsubscribe {
        self.subscribe_arc(Arc::new(listener))
    }

    pub(crate) fn subscribe_arc(&self, listener: Listener<T>) -> Unsubscribe {
        let id = {
            let mut listeners = self.listeners.lock();
            let id = ListenerId(listeners.next_id);
            listeners.next_id += 1;
            listeners.entries.insert(id, listener);
            id
        };

        let weak: Weak<Mutex<Listeners<T>>> = Arc::downgrade(&self.listeners);
        Unsubscribe::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.lock().entries.remove(&id);
            }
        })
    }

    /// Deliver `value` to every listener.
    pub fn notify(&self, value: &T) {
        for listener in self.snapshot() {
            listener(value);
        }
    }

    /// Copy of the current listeners, in registration order.
    pub(crate) fn snapshot(&self) -> Vec<Listener<T>> {
        self.listeners.lock().entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().entries.is_empty()
    }

    /// Drop every listener. Outstanding handles become no-ops.
    pub fn clear(&self) {
        self.listeners.lock().entries.clear();
    }
}

/// Clones share the listener set.
impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T: 'static> Default for Notifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Notifier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.lock().entries.len())
            .finish()
    }
}
