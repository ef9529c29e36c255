//! Key-path listener registry backing the deep containers.

use crate::types::{KeyPath, Listener, ListenerId, Unsubscribe};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use super::types::{RelatedEntry, Relation};

type Entry = BTreeMap<ListenerId, Listener<Value>>;

struct Registry {
    next_id: u64,
    /// Keyed structurally, so equal paths always share one entry.
    /// An entry exists only while it has at least one listener.
    entries: BTreeMap<KeyPath, Entry>,
}

/// Maps key-paths to listener sets.
///
/// Related-path queries are a linear scan over the registered paths;
/// registries hold dozens of paths, not millions.
pub struct PathNotifier {
    registry: Arc<Mutex<Registry>>,
}

impl PathNotifier {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                entries: BTreeMap::new(),
            })),
        }
    }

    /// Register `listener` under `path`, creating the entry if needed.
    ///
    /// The returned handle removes the listener and deletes the entry once
    /// it is empty.
    pub fn subscribe(
        &self,
        path: impl Into<KeyPath>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.subscribe_arc(path.into(), Arc::new(listener))
    }

    pub(crate) fn subscribe_arc(&self, path: KeyPath, listener: Listener<Value>) -> Unsubscribe {
        let id = {
            let mut registry = self.registry.lock();
            let id = ListenerId(registry.next_id);
            registry.next_id += 1;
            let entry = registry.entries.entry(path.clone()).or_insert_with(|| {
                debug!(path = %path, "path entry created");
                BTreeMap::new()
            });
            entry.insert(id, listener);
            id
        };

        let weak: Weak<Mutex<Registry>> = Arc::downgrade(&self.registry);
        Unsubscribe::new(move || {
            let Some(registry) = weak.upgrade() else {
                return;
            };
            let mut registry = registry.lock();
            let now_empty = match registry.entries.get_mut(&path) {
                Some(entry) => {
                    entry.remove(&id);
                    entry.is_empty()
                }
                None => false,
            };
            if now_empty {
                registry.entries.remove(&path);
                debug!(path = %path, "path entry removed");
            }
        })
    }

    /// Every registered path that is an ancestor of `path` (root included),
    /// `path` itself, or a descendant of `path`, with a copy of its
    /// listeners. Ordered by path.
    pub fn related(&self, path: &KeyPath) -> Vec<RelatedEntry> {
        let registry = self.registry.lock();
        registry
            .entries
            .iter()
            .filter_map(|(registered, entry)| {
                Relation::between(registered, path).map(|relation| RelatedEntry {
                    path: registered.clone(),
                    relation,
                    listeners: entry.values().cloned().collect(),
                })
            })
            .collect()
    }

    /// Every entry, as seen from the root.
    pub fn all(&self) -> Vec<RelatedEntry> {
        self.related(&KeyPath::root())
    }

    /// Deliver `value` to the listeners of exactly `path`.
    ///
    /// Related paths are not touched: they need their own recomputed slice.
    /// Returns false if nothing is registered at `path`.
    pub fn notify(&self, path: &KeyPath, value: &Value) -> bool {
        let listeners: Vec<Listener<Value>> = match self.registry.lock().entries.get(path) {
            Some(entry) => entry.values().cloned().collect(),
            None => return false,
        };
        trace!(path = %path, listeners = listeners.len(), "notify");
        for listener in listeners {
            listener(value);
        }
        true
    }

    pub fn has(&self, path: &KeyPath) -> bool {
        self.registry.lock().entries.contains_key(path)
    }

    /// Listener count at exactly `path`.
    pub fn listener_count(&self, path: &KeyPath) -> usize {
        self.registry
            .lock()
            .entries
            .get(path)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    /// Registered paths, ordered.
    pub fn paths(&self) -> Vec<KeyPath> {
        self.registry.lock().entries.keys().cloned().collect()
    }

    /// Number of registered paths.
    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().entries.is_empty()
    }

    /// Drop every entry. Outstanding handles become no-ops.
    pub fn clear(&self) {
        self.registry.lock().entries.clear();
    }
}

impl Default for PathNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PathNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathNotifier")
            .field("paths", &self.paths())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    fn noop(_: &Value) {}

    #[test]
    fn test_related_counts() {
        let notifier = PathNotifier::new();

        let _ = notifier.subscribe(path!["a", "b", "c", "d", "e"], noop);
        let _ = notifier.subscribe(path!["a", "b", "x", "y"], noop);

        assert_eq!(notifier.related(&path!["a"]).len(), 2);
        assert_eq!(notifier.related(&path!["a", "b"]).len(), 2);
        assert_eq!(notifier.related(&path!["a", "b", "c"]).len(), 1);
        assert_eq!(notifier.related(&path!["a", "b", "c", "d"]).len(), 1);
        assert_eq!(notifier.related(&path!["a", "b", "c", "d", "e"]).len(), 1);
        assert_eq!(notifier.related(&path!["a", "b", "x"]).len(), 1);
        assert_eq!(notifier.related(&path!["a", "b", "x", "y"]).len(), 1);
        assert_eq!(notifier.related(&path!["z"]).len(), 0);
    }

    #[test]
    fn test_related_relations() {
        let notifier = PathNotifier::new();
        let _ = notifier.subscribe(path![], noop);
        let _ = notifier.subscribe(path!["a"], noop);
        let _ = notifier.subscribe(path!["a", "b"], noop);
        let _ = notifier.subscribe(path!["a", "b", "c"], noop);
        let _ = notifier.subscribe(path!["a", "z"], noop);

        let related = notifier.related(&path!["a", "b"]);
        let relations: Vec<_> = related.iter().map(|e| (e.path.clone(), e.relation)).collect();

        assert_eq!(
            relations,
            vec![
                (path![], Relation::Ancestor),
                (path!["a"], Relation::Ancestor),
                (path!["a", "b"], Relation::Exact),
                (path!["a", "b", "c"], Relation::Descendant),
            ]
        );
    }

    #[test]
    fn test_structurally_equal_paths_share_entry() {
        let notifier = PathNotifier::new();

        let first = notifier.subscribe(vec!["x", "y"], noop);
        let second = notifier.subscribe(["x", "y"], noop);

        assert_eq!(notifier.len(), 1);
        assert_eq!(notifier.listener_count(&path!["x", "y"]), 2);

        first.call();
        assert!(notifier.has(&path!["x", "y"]));
        assert_eq!(notifier.listener_count(&path!["x", "y"]), 1);

        second.call();
        assert!(!notifier.has(&path!["x", "y"]));
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_notify_exact_only() {
        let notifier = PathNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _ = notifier.subscribe(path!["a"], move |v| sink.lock().push(("a", v.clone())));
        let sink = Arc::clone(&seen);
        let _ = notifier.subscribe(path!["a", "b"], move |v| sink.lock().push(("ab", v.clone())));

        assert!(notifier.notify(&path!["a", "b"], &json!(1)));
        assert!(!notifier.notify(&path!["q"], &json!(1)));

        assert_eq!(*seen.lock(), vec![("ab", json!(1))]);
    }

    #[test]
    fn test_root_entry_is_distinct() {
        let notifier = PathNotifier::new();
        let root = notifier.subscribe((), noop);
        let _ = notifier.subscribe(path!["a"], noop);

        assert!(notifier.has(&KeyPath::root()));
        assert_eq!(notifier.len(), 2);
        root.call();
        assert!(!notifier.has(&KeyPath::root()));
        assert_eq!(notifier.all().len(), 1);
    }

    #[test]
    fn test_unsubscribe_after_drop_is_noop() {
        let notifier = PathNotifier::new();
        let unsubscribe = notifier.subscribe(path!["a"], noop);
        drop(notifier);
        assert!(unsubscribe.call());
    }
}
