//! Shared scalar value with equality-gated change notification.

use crate::compose::{composed_subscription, Teardown};
use crate::subscriptions::Notifier;
use crate::types::{Trigger, Unsubscribe};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::trace;

struct ObservableInner<T> {
    current: RwLock<T>,
    notifier: Notifier<T>,
}

/// A value that notifies its listeners whenever it changes.
///
/// Writes are gated by `PartialEq`: setting an equal value is a no-op.
/// Clones share the value and the listeners.
pub struct Observable<T> {
    inner: Arc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                current: RwLock::new(initial),
                notifier: Notifier::new(),
            }),
        }
    }

    /// Build a value recomputed from `getter` whenever any source wired by
    /// `listen` fires.
    ///
    /// Returns the value and the handle that releases the sources. The
    /// sources only hold a weak reference: once every clone of the value is
    /// dropped, further triggers do nothing.
    pub fn from_listen<R: Into<Teardown>>(
        getter: impl Fn() -> T + Send + Sync + 'static,
        listen: impl FnOnce(Trigger) -> R,
    ) -> (Self, Unsubscribe) {
        let observable = Self::new(getter());
        let weak: Weak<ObservableInner<T>> = Arc::downgrade(&observable.inner);

        let teardown = composed_subscription(
            move || {
                if let Some(inner) = weak.upgrade() {
                    Observable { inner }.set(getter());
                }
            },
            listen,
        );

        (observable, teardown)
    }

    /// Copy of the current value.
    pub fn get(&self) -> T {
        self.inner.current.read().clone()
    }

    /// Borrow the current value. Do not write to this observable from `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.current.read())
    }

    /// Store `value` and notify, unless it equals the current value.
    pub fn set(&self, value: T) -> bool {
        if !self.set_silently(value) {
            return false;
        }
        self.notify();
        true
    }

    /// Apply `f` to a copy of the value and [`set`](Self::set) the result.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.get();
        f(&mut next);
        self.set(next)
    }

    /// Store `value` without notifying. Returns whether it differed.
    pub(crate) fn set_silently(&self, value: T) -> bool {
        let mut current = self.inner.current.write();
        if *current == value {
            return false;
        }
        *current = value;
        true
    }

    /// Listen for changes.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Unsubscribe {
        self.inner.notifier.subscribe(listener)
    }

    /// Call `listener` with the current value now, then on every change.
    pub fn handle(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Unsubscribe {
        listener(&self.get());
        self.subscribe(listener)
    }

    /// Announce the current value, changed or not.
    pub fn notify(&self) {
        let value = self.get();
        trace!(listeners = self.inner.notifier.len(), "observable notify");
        self.inner.notifier.notify(&value);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.notifier.len()
    }
}

impl<T: Default + Clone + PartialEq + Send + Sync + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("current", &*self.inner.current.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_set_is_equality_gated() {
        let value = Observable::new(vec![1, 2]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = value.subscribe(move |v: &Vec<i32>| sink.lock().push(v.clone()));

        assert!(!value.set(vec![1, 2]));
        assert!(value.set(vec![2, 1]));
        assert!(value.update(|v| v.push(3)));
        assert!(!value.update(|_| {}));

        assert_eq!(*seen.lock(), vec![vec![2, 1], vec![2, 1, 3]]);
    }

    #[test]
    fn test_handle_seeds_listener() {
        let value = Observable::new(7);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let unsubscribe = value.handle(move |v| sink.lock().push(*v));
        value.set(8);
        unsubscribe.call();
        value.set(9);

        assert_eq!(*seen.lock(), vec![7, 8]);
    }

    #[test]
    fn test_from_listen_recomputes() {
        let a = Observable::new(2);
        let b = Observable::new(3);

        let (product, teardown) = {
            let (ga, gb) = (a.clone(), b.clone());
            Observable::from_listen(
                move || ga.get() * gb.get(),
                |trigger| {
                    let t = trigger.clone();
                    vec![a.subscribe(move |_| t()), b.subscribe(move |_| trigger())]
                },
            )
        };
        assert_eq!(product.get(), 6);

        a.set(5);
        assert_eq!(product.get(), 15);

        teardown.call();
        b.set(10);
        assert_eq!(product.get(), 15);
        assert_eq!(a.listener_count(), 0);
    }

    #[test]
    fn test_silent_set_then_notify() {
        let value = Observable::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = value.subscribe(move |v| sink.lock().push(*v));

        assert!(value.set_silently(1));
        assert!(seen.lock().is_empty());

        value.notify();
        assert_eq!(*seen.lock(), vec![1]);
    }
}
