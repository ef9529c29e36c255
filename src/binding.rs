//! Adapters for a host render loop.
//!
//! The host supplies a re-render [`Trigger`] and calls the `use_*` methods on
//! every render pass. Subscriptions are acquired when their dependencies
//! change and released when they change again or the binding is dropped.

use crate::compose::{composed_subscription, Teardown};
use crate::state::DeepContainer;
use crate::types::{KeyPath, Trigger, Unsubscribe};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// A resource keyed by a dependency value.
///
/// [`acquire`](Self::acquire) reuses the resource while the dependency stays
/// equal, and clears the old one before building a new one when it changes.
/// The last resource is cleared by [`dispose`](Self::dispose) or on drop.
pub struct ClearedMemo<D, R = Unsubscribe> {
    current: Option<(D, R)>,
    clear: Box<dyn FnMut(R) + Send>,
}

impl<D: PartialEq> ClearedMemo<D, Unsubscribe> {
    /// A memo of subscriptions, cleared by unsubscribing.
    pub fn subscriptions() -> Self {
        Self::new(|unsubscribe: Unsubscribe| {
            unsubscribe.call();
        })
    }
}

impl<D: PartialEq, R> ClearedMemo<D, R> {
    pub fn new(clear: impl FnMut(R) + Send + 'static) -> Self {
        Self {
            current: None,
            clear: Box::new(clear),
        }
    }

    /// The resource for `deps`, building it with `get` if `deps` changed.
    pub fn acquire(&mut self, deps: D, get: impl FnOnce() -> R) -> &R {
        let reuse = matches!(&self.current, Some((current, _)) if *current == deps);
        if !reuse {
            if let Some((_, previous)) = self.current.take() {
                (self.clear)(previous);
            }
            trace!("cleared memo reacquired");
        }
        let (_, resource) = self.current.get_or_insert_with(|| (deps, get()));
        resource
    }

    pub fn get(&self) -> Option<&R> {
        self.current.as_ref().map(|(_, resource)| resource)
    }

    /// Clear the current resource. Returns false if there was none.
    pub fn dispose(&mut self) -> bool {
        match self.current.take() {
            Some((_, resource)) => {
                (self.clear)(resource);
                true
            }
            None => false,
        }
    }
}

impl<D, R> Drop for ClearedMemo<D, R> {
    fn drop(&mut self) {
        if let Some((_, resource)) = self.current.take() {
            (self.clear)(resource);
        }
    }
}

/// Re-render whenever one path of a container changes.
pub struct PathBinding {
    container: DeepContainer,
    rerender: Trigger,
    memo: ClearedMemo<KeyPath>,
}

impl PathBinding {
    pub fn new(container: DeepContainer, rerender: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            container,
            rerender: Arc::new(rerender),
            memo: ClearedMemo::subscriptions(),
        }
    }

    /// Render pass: make sure `path` is watched and read its current slice.
    pub fn use_path(&mut self, path: impl Into<KeyPath>) -> Option<Value> {
        let path = path.into();
        let container = &self.container;
        let rerender = Arc::clone(&self.rerender);
        self.memo.acquire(path.clone(), || {
            container.subscribe(&path, move |_| rerender())
        });
        self.container.get(&path)
    }

    /// Stop watching.
    pub fn dispose(&mut self) -> bool {
        self.memo.dispose()
    }
}

/// Re-render when a value composed from several sources changes.
pub struct ComposedValueBinding<T, D = ()> {
    value: Arc<RwLock<Option<T>>>,
    rerender: Trigger,
    memo: ClearedMemo<D>,
}

impl<T, D> ComposedValueBinding<T, D>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    D: PartialEq,
{
    pub fn new(rerender: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            value: Arc::new(RwLock::new(None)),
            rerender: Arc::new(rerender),
            memo: ClearedMemo::subscriptions(),
        }
    }

    /// Render pass: (re)wire `listen` when `deps` changed and return the
    /// composed value. Later changes of the value trigger a re-render.
    pub fn use_value<R: Into<Teardown>>(
        &mut self,
        deps: D,
        getter: impl Fn() -> T + Send + Sync + 'static,
        listen: impl FnOnce(Trigger) -> R,
    ) -> T {
        let getter: Arc<dyn Fn() -> T + Send + Sync> = Arc::new(getter);

        let value = Arc::clone(&self.value);
        let rerender = Arc::clone(&self.rerender);
        let source = Arc::clone(&getter);
        self.memo.acquire(deps, move || {
            *value.write() = Some(source());
            composed_subscription(
                move || {
                    let next = source();
                    let changed = {
                        let mut current = value.write();
                        if current.as_ref() == Some(&next) {
                            false
                        } else {
                            *current = Some(next);
                            true
                        }
                    };
                    if changed {
                        rerender();
                    }
                },
                listen,
            )
        });

        let cached = self.value.read().clone();
        cached.unwrap_or_else(|| getter())
    }

    pub fn dispose(&mut self) -> bool {
        self.memo.dispose()
    }
}
