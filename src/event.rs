//! Event bus: fire-and-forget notifications with a payload.

use crate::subscriptions::Notifier;
use crate::types::Unsubscribe;
use tracing::trace;

/// Broadcasts `(event, payload)` pairs to every listener.
///
/// Unlike [`Observable`](crate::Observable) there is no stored value and no
/// equality gate: every emit is delivered. Clones share the listeners.
pub struct EventBus<E, P = ()> {
    notifier: Notifier<(E, P)>,
}

impl<E, P> Clone for EventBus<E, P> {
    fn clone(&self) -> Self {
        Self {
            notifier: self.notifier.clone(),
        }
    }
}

impl<E: 'static, P: 'static> EventBus<E, P> {
    pub fn new() -> Self {
        Self {
            notifier: Notifier::new(),
        }
    }

    pub fn emit(&self, event: E, payload: P) {
        trace!(listeners = self.notifier.len(), "emit");
        self.notifier.notify(&(event, payload));
    }

    /// Emit `event` once per payload, in order.
    pub fn emit_each(&self, event: E, payloads: impl IntoIterator<Item = P>)
    where
        E: Clone,
    {
        for payload in payloads {
            self.emit(event.clone(), payload);
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&E, &P) + Send + Sync + 'static) -> Unsubscribe {
        self.notifier
            .subscribe(move |(event, payload): &(E, P)| listener(event, payload))
    }

    pub fn listener_count(&self) -> usize {
        self.notifier.len()
    }
}

impl<E: 'static, P: 'static> Default for EventBus<E, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, P> std::fmt::Debug for EventBus<E, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Debug, PartialEq)]
    enum Event {
        Saved,
        Failed,
    }

    #[test]
    fn test_every_emit_is_delivered() {
        let bus: EventBus<Event, u32> = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let unsubscribe = bus.subscribe(move |e, p| sink.lock().push((e.clone(), *p)));

        bus.emit(Event::Saved, 1);
        bus.emit(Event::Saved, 1);
        bus.emit_each(Event::Failed, [2, 3]);
        unsubscribe.call();
        bus.emit(Event::Saved, 4);

        assert_eq!(
            *seen.lock(),
            vec![
                (Event::Saved, 1),
                (Event::Saved, 1),
                (Event::Failed, 2),
                (Event::Failed, 3),
            ]
        );
    }

    #[test]
    fn test_unit_payload() {
        let bus: EventBus<&'static str> = EventBus::default();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let _sub = bus.subscribe(move |_, _| *sink.lock() += 1);

        bus.emit("ping", ());
        assert_eq!(*count.lock(), 1);
        assert_eq!(bus.listener_count(), 1);
    }
}
