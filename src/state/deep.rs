//! Deep container: a nested value with per-path subscriptions.

use crate::error::{Result, WatchError};
use crate::subscriptions::{PathNotifier, RelatedEntry, Relation};
use crate::types::{KeyPath, Unsubscribe};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::trace;

use super::operations;

/// Entries whose slice a write changed, delivered after the lock is
/// released so listeners can write back into any container.
///
/// Each entry is sent its slice as it is at delivery time, so the last
/// value a listener receives is the current one even when another listener
/// wrote in between.
#[must_use]
pub(crate) struct Dispatch {
    source: DeepContainer,
    entries: Vec<RelatedEntry>,
}

impl Dispatch {
    pub(crate) fn deliver(self) {
        for entry in self.entries {
            let value = self.source.get(&entry.path).unwrap_or(Value::Null);
            trace!(path = %entry.path, listeners = entry.listener_count(), "deliver");
            entry.notify(&value);
        }
    }
}

struct DeepInner {
    current: RwLock<Value>,
    notifier: PathNotifier,
}

/// A nested value that can be read, written and observed by key-path.
///
/// A write at path `P` reaches listeners on `P`, on every ancestor of `P`
/// and on every descendant of `P`. Each listener receives its own slice of
/// the new value, and only if that slice changed. Slices that no longer
/// exist are delivered as `null`.
///
/// Cloning the container clones the handle: both clones share the value and
/// the subscriptions. There is no automatic disposal; release subscriptions
/// with the [`Unsubscribe`] handles.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use watchtree::{path, DeepContainer};
///
/// let state = DeepContainer::with_value(json!({"a": {"b": 1}}));
/// let unsubscribe = state.subscribe(path!["a"], |a| println!("a is now {a}"));
///
/// assert!(!state.set(path!["a", "b"], 1)?); // equal: no-op
/// assert!(state.set(path!["a", "b"], 2)?);  // prints `a is now {"b":2}`
///
/// unsubscribe.call();
/// # Ok::<(), watchtree::WatchError>(())
/// ```
#[derive(Clone)]
pub struct DeepContainer {
    inner: Arc<DeepInner>,
}

impl DeepContainer {
    /// An empty object.
    pub fn new() -> Self {
        Self::with_value(Value::Object(Map::new()))
    }

    pub fn with_value(initial: impl Into<Value>) -> Self {
        Self {
            inner: Arc::new(DeepInner {
                current: RwLock::new(initial.into()),
                notifier: PathNotifier::new(),
            }),
        }
    }

    /// Build from any serializable value.
    pub fn from_serialize<T: Serialize>(initial: &T) -> Result<Self> {
        Ok(Self::with_value(serde_json::to_value(initial)?))
    }

    // --- Reads ---

    /// Copy of the value at `path`, or `None` if the path does not exist.
    ///
    /// Returns an owned copy, so the result can never bypass notification.
    /// Use [`with`](Self::with) to inspect large values without copying.
    pub fn get(&self, path: impl Into<KeyPath>) -> Option<Value> {
        operations::slice(&self.inner.current.read(), &path.into())
    }

    /// Copy of the whole value.
    pub fn get_root(&self) -> Value {
        self.inner.current.read().clone()
    }

    /// The value at `path`, deserialized.
    pub fn get_as<T: DeserializeOwned>(&self, path: impl Into<KeyPath>) -> Result<Option<T>> {
        match self.get(path) {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| WatchError::Deserialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Borrow the value at `path` for the duration of `f`.
    ///
    /// The value is read-locked while `f` runs: writing to this container
    /// from inside `f` deadlocks.
    pub fn with<R>(&self, path: impl Into<KeyPath>, f: impl FnOnce(Option<&Value>) -> R) -> R {
        let current = self.inner.current.read();
        f(operations::get_at(&current, &path.into()))
    }

    // --- Writes ---

    /// Write `value` at `path` and notify every related subscription whose
    /// slice changed.
    ///
    /// Returns `Ok(false)` when the value at `path` already equals `value`:
    /// nothing is written and nobody is notified. A root path behaves like
    /// [`replace`](Self::replace).
    pub fn set(&self, path: impl Into<KeyPath>, value: impl Into<Value>) -> Result<bool> {
        match self.commit(&path.into(), value.into())? {
            Some(dispatch) => {
                dispatch.deliver();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Serialize `value` and write it at `path`.
    pub fn set_serialize<T: Serialize>(&self, path: impl Into<KeyPath>, value: &T) -> Result<bool> {
        self.set(path, serde_json::to_value(value)?)
    }

    /// Replace the whole value.
    ///
    /// Unlike a sub-path write, an equal value is still stored (it simply
    /// notifies nobody). Returns whether anything was notified.
    pub fn replace(&self, value: impl Into<Value>) -> bool {
        match self.commit_replace(value.into()) {
            Some(dispatch) => {
                dispatch.deliver();
                true
            }
            None => false,
        }
    }

    /// Apply the write under the lock and return what to deliver once it is
    /// released. `None` means nothing changed.
    pub(crate) fn commit(&self, path: &KeyPath, value: Value) -> Result<Option<Dispatch>> {
        if path.is_root() {
            return Ok(self.commit_replace(value));
        }

        let mut current = self.inner.current.write();

        let before = operations::slice(&current, path);
        if before.as_ref() == Some(&value) {
            trace!(path = %path, "set is a no-op");
            return Ok(None);
        }

        let related = self.inner.notifier.related(path);
        operations::set_at(&mut current, path, value)?;

        let mut entries = Vec::with_capacity(related.len());
        for entry in related {
            match entry.relation {
                // The written slot lies inside every ancestor, so they all
                // changed along with it.
                Relation::Ancestor | Relation::Exact => entries.push(entry),
                Relation::Descendant => {
                    let next = operations::get_at(&current, &entry.path);
                    let previous = entry
                        .path
                        .strip_prefix(path)
                        .and_then(|suffix| before.as_ref().and_then(|b| operations::get_at(b, &suffix)));
                    if previous != next {
                        entries.push(entry);
                    }
                }
            }
        }

        trace!(path = %path, deliveries = entries.len(), "set");
        Ok(Some(self.dispatch(entries)))
    }

    pub(crate) fn commit_replace(&self, value: Value) -> Option<Dispatch> {
        let mut current = self.inner.current.write();

        if *current == value {
            *current = value;
            trace!("replace is a no-op");
            return None;
        }

        let before = std::mem::replace(&mut *current, value);
        let entries: Vec<_> = self
            .inner
            .notifier
            .all()
            .into_iter()
            .filter(|entry| {
                entry.path.is_root()
                    || operations::get_at(&before, &entry.path) != operations::get_at(&current, &entry.path)
            })
            .collect();

        trace!(deliveries = entries.len(), "replace");
        Some(self.dispatch(entries))
    }

    fn dispatch(&self, entries: Vec<RelatedEntry>) -> Dispatch {
        Dispatch {
            source: self.clone(),
            entries,
        }
    }

    /// Mutate the value in place WITHOUT notifying anyone.
    ///
    /// This bypasses equality checks and subscriptions entirely. Follow it
    /// with [`notify`](Self::notify) or [`notify_all`](Self::notify_all) for
    /// the paths you touched.
    pub fn mutate_unnotified<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(&mut self.inner.current.write())
    }

    // --- Subscriptions ---

    /// Listen for changes of the slice at `path`.
    pub fn subscribe(
        &self,
        path: impl Into<KeyPath>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.inner.notifier.subscribe(path, listener)
    }

    /// Call `listener` with the current slice at `path`, then subscribe it.
    pub fn handle(
        &self,
        path: impl Into<KeyPath>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let path = path.into();
        listener(&self.get(&path).unwrap_or(Value::Null));
        self.subscribe(path, listener)
    }

    /// Re-announce the current slice at exactly `path`, changed or not.
    ///
    /// Returns false if nothing listens there.
    pub fn notify(&self, path: impl Into<KeyPath>) -> bool {
        let path = path.into();
        let value = self.get(&path).unwrap_or(Value::Null);
        self.inner.notifier.notify(&path, &value)
    }

    /// Re-announce every registered path with its current slice.
    pub fn notify_all(&self) {
        self.dispatch(self.inner.notifier.all()).deliver();
    }

    pub fn has_subscribers(&self, path: impl Into<KeyPath>) -> bool {
        self.inner.notifier.has(&path.into())
    }

    /// Paths with at least one listener, ordered.
    pub fn subscribed_paths(&self) -> Vec<KeyPath> {
        self.inner.notifier.paths()
    }
}

impl Default for DeepContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeepContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepContainer")
            .field("current", &*self.inner.current.read())
            .field("subscribed_paths", &self.inner.notifier.paths())
            .finish()
    }
}
