//! Read-only values derived from other observables.

use crate::compose::{composed_subscription, Teardown};
use crate::observable::Observable;
use crate::types::{Trigger, Unsubscribe};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tracing::debug;

/// A read-only value computed by `getter` and recomputed whenever any source
/// wired by `listen` fires. Listeners only hear about actual changes.
///
/// The sources are released by [`dispose`](Self::dispose) or when the value
/// is dropped.
///
/// ```
/// use watchtree::{Derived, Observable};
///
/// let first = Observable::new("Ada".to_string());
/// let last = Observable::new("Lovelace".to_string());
///
/// let full = {
///     let (f, l) = (first.clone(), last.clone());
///     Derived::new(
///         move || format!("{} {}", f.get(), l.get()),
///         |trigger| {
///             let t = trigger.clone();
///             vec![first.subscribe(move |_| t()), last.subscribe(move |_| trigger())]
///         },
///     )
/// };
///
/// last.set("Byron".to_string());
/// assert_eq!(full.get(), "Ada Byron");
/// ```
pub struct Derived<T> {
    value: Observable<T>,
    teardown: Unsubscribe,
}

impl<T> Derived<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new<R: Into<Teardown>>(
        getter: impl Fn() -> T + Send + Sync + 'static,
        listen: impl FnOnce(Trigger) -> R,
    ) -> Self {
        let (value, teardown) = Observable::from_listen(getter, listen);
        Self { value, teardown }
    }

    pub fn get(&self) -> T {
        self.value.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.value.with(f)
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Unsubscribe {
        self.value.subscribe(listener)
    }

    pub fn handle(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Unsubscribe {
        self.value.handle(listener)
    }

    /// Release the sources. The value keeps its last computed state.
    pub fn dispose(&self) -> bool {
        self.teardown.call()
    }

    pub fn is_active(&self) -> bool {
        self.teardown.is_active()
    }
}

impl<T> Drop for Derived<T> {
    fn drop(&mut self) {
        self.teardown.call();
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derived")
            .field("value", &self.value)
            .field("active", &self.teardown.is_active())
            .finish()
    }
}

type Getter<T> = Arc<dyn Fn() -> T + Send + Sync>;

struct DynamicInner<T> {
    value: Observable<T>,
    getter: RwLock<Getter<T>>,
    teardown: Mutex<Option<Unsubscribe>>,
}

impl<T> DynamicInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn refresh(&self) -> bool {
        let getter = self.getter.read().clone();
        self.value.set(getter())
    }

    fn release(&self) -> bool {
        let teardown = self.teardown.lock().take();
        teardown.map(|t| t.call()).unwrap_or(false)
    }
}

/// A derived value whose getter and sources can be swapped at runtime.
pub struct DynamicDerived<T> {
    inner: Arc<DynamicInner<T>>,
}

impl<T> DynamicDerived<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new<R: Into<Teardown>>(
        getter: impl Fn() -> T + Send + Sync + 'static,
        listen: impl FnOnce(Trigger) -> R,
    ) -> Self {
        let derived = Self {
            inner: Arc::new(DynamicInner {
                value: Observable::new(getter()),
                getter: RwLock::new(Arc::new(getter)),
                teardown: Mutex::new(None),
            }),
        };
        derived.set_listen(listen);
        derived
    }

    pub fn get(&self) -> T {
        self.inner.value.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.value.with(f)
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Unsubscribe {
        self.inner.value.subscribe(listener)
    }

    pub fn handle(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Unsubscribe {
        self.inner.value.handle(listener)
    }

    /// Swap the getter and recompute. Returns whether the value changed.
    pub fn set_getter(&self, getter: impl Fn() -> T + Send + Sync + 'static) -> bool {
        *self.inner.getter.write() = Arc::new(getter);
        self.inner.refresh()
    }

    /// Release the current sources and wire the new ones.
    pub fn set_listen<R: Into<Teardown>>(&self, listen: impl FnOnce(Trigger) -> R) {
        self.inner.release();

        let weak: Weak<DynamicInner<T>> = Arc::downgrade(&self.inner);
        let teardown = composed_subscription(
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.refresh();
                }
            },
            listen,
        );

        debug!("dynamic derived value rewired");
        *self.inner.teardown.lock() = Some(teardown);
    }

    /// Recompute now. Returns whether the value changed.
    pub fn refresh(&self) -> bool {
        self.inner.refresh()
    }

    /// Release the current sources.
    pub fn dispose(&self) -> bool {
        self.inner.release()
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .teardown
            .lock()
            .as_ref()
            .map(Unsubscribe::is_active)
            .unwrap_or(false)
    }
}

impl<T> Drop for DynamicDerived<T> {
    fn drop(&mut self) {
        let teardown = self.inner.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown.call();
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for DynamicDerived<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicDerived")
            .field("value", &self.inner.value)
            .finish()
    }
}
