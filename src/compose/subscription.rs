//! Composed subscriptions: many upstream subscriptions behind one handle.

use crate::types::{Trigger, Unsubscribe};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// What a `listen` function hands back: nothing, one handle, or several
/// (some of which may be absent).
#[must_use]
pub enum Teardown {
    None,
    One(Unsubscribe),
    Many(Vec<Option<Unsubscribe>>),
}

impl Teardown {
    /// Flatten into the handles that actually need releasing.
    pub fn into_handles(self) -> Vec<Unsubscribe> {
        match self {
            Teardown::None => Vec::new(),
            Teardown::One(handle) => vec![handle],
            Teardown::Many(handles) => handles.into_iter().flatten().collect(),
        }
    }

    /// Merge into a single handle that releases every upstream once.
    pub fn merge(self) -> Unsubscribe {
        let mut handles = self.into_handles();
        match handles.len() {
            0 => Unsubscribe::noop(),
            1 => handles.remove(0),
            _ => Unsubscribe::new(move || {
                for handle in handles {
                    handle.call();
                }
            }),
        }
    }
}

impl From<()> for Teardown {
    fn from(_: ()) -> Self {
        Teardown::None
    }
}

impl From<Unsubscribe> for Teardown {
    fn from(handle: Unsubscribe) -> Self {
        Teardown::One(handle)
    }
}

impl From<Option<Unsubscribe>> for Teardown {
    fn from(handle: Option<Unsubscribe>) -> Self {
        match handle {
            Some(handle) => Teardown::One(handle),
            None => Teardown::None,
        }
    }
}

impl From<Vec<Unsubscribe>> for Teardown {
    fn from(handles: Vec<Unsubscribe>) -> Self {
        Teardown::Many(handles.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<Unsubscribe>>> for Teardown {
    fn from(handles: Vec<Option<Unsubscribe>>) -> Self {
        Teardown::Many(handles)
    }
}

impl<const N: usize> From<[Unsubscribe; N]> for Teardown {
    fn from(handles: [Unsubscribe; N]) -> Self {
        Teardown::Many(handles.into_iter().map(Some).collect())
    }
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Teardown::None => write!(f, "Teardown::None"),
            Teardown::One(_) => write!(f, "Teardown::One"),
            Teardown::Many(handles) => write!(
                f,
                "Teardown::Many({}/{})",
                handles.iter().flatten().count(),
                handles.len()
            ),
        }
    }
}

/// Subscribe `listener` to every source `listen` wires it into.
///
/// `listen` runs once, synchronously, with the listener as a [`Trigger`].
/// The returned handle releases every upstream subscription exactly once.
///
/// ```
/// use watchtree::{composed_subscription, Observable};
///
/// let a = Observable::new(1);
/// let b = Observable::new(2);
///
/// let unsubscribe = composed_subscription(
///     || println!("a or b changed"),
///     |trigger| {
///         let t = trigger.clone();
///         vec![a.subscribe(move |_| t()), b.subscribe(move |_| trigger())]
///     },
/// );
///
/// a.set(10);
/// unsubscribe.call();
/// ```
pub fn composed_subscription<R: Into<Teardown>>(
    listener: impl Fn() + Send + Sync + 'static,
    listen: impl FnOnce(Trigger) -> R,
) -> Unsubscribe {
    let teardown = listen(Arc::new(listener)).into();
    trace!(teardown = ?teardown, "composed subscription");
    teardown.merge()
}

/// [`composed_subscription`] for a `listen` that can fail.
///
/// The error is returned unchanged. Handles created before the failure are
/// owned by `listen`; nothing is released on its behalf.
pub fn try_composed_subscription<R: Into<Teardown>, E>(
    listener: impl Fn() + Send + Sync + 'static,
    listen: impl FnOnce(Trigger) -> std::result::Result<R, E>,
) -> std::result::Result<Unsubscribe, E> {
    let teardown = listen(Arc::new(listener))?.into();
    Ok(teardown.merge())
}

/// Run `handler` once to seed current state, then subscribe it.
pub fn composed_handler<R: Into<Teardown>>(
    handler: impl Fn() + Send + Sync + 'static,
    listen: impl FnOnce(Trigger) -> R,
) -> Unsubscribe {
    handler();
    composed_subscription(handler, listen)
}

/// Subscribe `listener` through `listen`, and redo that subscription
/// whenever any `listen_hydrate` source fires.
///
/// Use it when the source to listen to depends on other state: the previous
/// handle is released before `listen` runs again.
pub fn hydrated_subscription<L, H>(
    listener: L,
    listen: impl Fn(L) -> Unsubscribe + Send + Sync + 'static,
    listen_hydrate: impl FnOnce(Trigger) -> H,
) -> Unsubscribe
where
    L: Clone + Send + Sync + 'static,
    H: Into<Teardown>,
{
    let current: Arc<Mutex<Option<Unsubscribe>>> = Arc::new(Mutex::new(None));

    let hydrate = {
        let current = Arc::clone(&current);
        move || {
            let previous = current.lock().take();
            if let Some(previous) = previous {
                previous.call();
            }
            let next = listen(listener.clone());
            trace!("subscription rehydrated");
            *current.lock() = Some(next);
        }
    };

    let unsubscribe_hydrate = composed_handler(hydrate, listen_hydrate);

    Unsubscribe::new(move || {
        unsubscribe_hydrate.call();
        let inner = current.lock().take();
        if let Some(inner) = inner {
            inner.call();
        }
    })
}

/// A composed subscription whose upstream set is rebuilt whenever any
/// `listen_hydrate` source fires.
///
/// The composed form of [`hydrated_subscription`]: `listen` may wire the
/// trigger into any number of sources.
pub fn hydrated_composed_subscription<R, H>(
    listener: impl Fn() + Send + Sync + 'static,
    listen: impl Fn(Trigger) -> R + Send + Sync + 'static,
    listen_hydrate: impl FnOnce(Trigger) -> H,
) -> Unsubscribe
where
    R: Into<Teardown>,
    H: Into<Teardown>,
{
    let listener: Trigger = Arc::new(listener);
    hydrated_subscription(
        listener,
        move |listener: Trigger| composed_subscription(move || listener(), &listen),
        listen_hydrate,
    )
}

/// Run `handler` once, then subscribe it as a
/// [`hydrated_composed_subscription`].
pub fn hydrated_composed_handler<R, H>(
    handler: impl Fn() + Send + Sync + 'static,
    listen: impl Fn(Trigger) -> R + Send + Sync + 'static,
    listen_hydrate: impl FnOnce(Trigger) -> H,
) -> Unsubscribe
where
    R: Into<Teardown>,
    H: Into<Teardown>,
{
    handler();
    hydrated_composed_subscription(handler, listen, listen_hydrate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::Notifier;
    use crate::types::Listener;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        (count, move || {
            sink.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_any_source_triggers() {
        let a: Notifier<i32> = Notifier::new();
        let b: Notifier<i32> = Notifier::new();
        let (count, listener) = counter();

        let unsubscribe = composed_subscription(listener, |trigger| {
            let t = trigger.clone();
            vec![a.subscribe(move |_| t()), b.subscribe(move |_| trigger())]
        });

        a.notify(&1);
        b.notify(&2);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        unsubscribe.call();
        a.notify(&3);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(a.is_empty() && b.is_empty());
    }

    #[test]
    fn test_absent_handles_are_skipped() {
        let a: Notifier<i32> = Notifier::new();
        let (count, listener) = counter();

        let unsubscribe = composed_subscription(listener, |trigger| {
            vec![None, Some(a.subscribe(move |_| trigger())), None]
        });

        a.notify(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(unsubscribe.call());
        assert!(a.is_empty());
    }

    #[test]
    fn test_teardown_runs_each_upstream_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let make = |releases: &Arc<AtomicUsize>| {
            let releases = Arc::clone(releases);
            Unsubscribe::new(move || {
                releases.fetch_add(1, Ordering::SeqCst);
            })
        };

        let unsubscribe = composed_subscription(|| {}, |_| [make(&releases), make(&releases)]);

        assert!(unsubscribe.call());
        assert!(!unsubscribe.call());
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_void_listen() {
        let unsubscribe = composed_subscription(|| {}, |_| ());
        assert!(!unsubscribe.is_active());
        assert!(!unsubscribe.call());
    }

    #[test]
    fn test_handler_is_seeded() {
        let a: Notifier<i32> = Notifier::new();
        let (count, handler) = counter();

        let _unsubscribe = composed_handler(handler, |trigger| a.subscribe(move |_| trigger()));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        a.notify(&1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_try_listen_error_propagates() {
        let result = try_composed_subscription(|| {}, |_| -> std::result::Result<(), &str> {
            Err("source unavailable")
        });
        assert_eq!(result.unwrap_err(), "source unavailable");

        let ok = try_composed_subscription(|| {}, |_| Ok::<_, &str>(Unsubscribe::noop()));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_hydration_rewires_sources() {
        let sources: Arc<Vec<Notifier<i32>>> = Arc::new(vec![Notifier::new(), Notifier::new()]);
        let selected = Arc::new(AtomicUsize::new(0));
        let selector: Notifier<()> = Notifier::new();
        let (count, listener) = counter();

        let listen = {
            let sources = Arc::clone(&sources);
            let selected = Arc::clone(&selected);
            move |trigger: Trigger| {
                let index = selected.load(Ordering::SeqCst);
                sources[index].subscribe(move |_| trigger())
            }
        };
        let unsubscribe = hydrated_composed_subscription(listener, listen, |trigger| {
            selector.subscribe(move |_| trigger())
        });

        sources[0].notify(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        selected.store(1, Ordering::SeqCst);
        selector.notify(&());
        assert!(sources[0].is_empty());

        sources[0].notify(&2);
        sources[1].notify(&3);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        unsubscribe.call();
        assert!(sources[1].is_empty());
        assert!(selector.is_empty());
    }

    #[test]
    fn test_hydrated_subscription_follows_selection() {
        let sources: Arc<Vec<Notifier<i32>>> = Arc::new(vec![Notifier::new(), Notifier::new()]);
        let selected = Arc::new(AtomicUsize::new(0));
        let selector: Notifier<()> = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let listener: Listener<i32> = Arc::new(move |v: &i32| sink.lock().push(*v));
        let listen = {
            let sources = Arc::clone(&sources);
            let selected = Arc::clone(&selected);
            move |listener: Listener<i32>| {
                let index = selected.load(Ordering::SeqCst);
                sources[index].subscribe(move |v| listener(v))
            }
        };
        let unsubscribe =
            hydrated_subscription(listener, listen, |trigger| selector.subscribe(move |_| trigger()));

        sources[0].notify(&1);
        selected.store(1, Ordering::SeqCst);
        selector.notify(&());
        sources[0].notify(&2);
        sources[1].notify(&3);

        assert_eq!(*seen.lock(), vec![1, 3]);
        assert!(sources[0].is_empty());

        assert!(unsubscribe.call());
        assert!(sources[1].is_empty());
        assert!(selector.is_empty());
    }

    #[test]
    fn test_hydrated_handler_is_seeded() {
        let source: Notifier<i32> = Notifier::new();
        let (count, handler) = counter();

        let unsubscribe = hydrated_composed_handler(
            handler,
            move |trigger: Trigger| source.subscribe(move |_| trigger()),
            |_| (),
        );

        assert_eq!(count.load(Ordering::SeqCst), 1);
        unsubscribe.call();
    }
}
