//! Ordered collection of identifiable items.
//!
//! Items live in a [`DeepContainer`] keyed by identity (the "record"), next
//! to an [`Observable`] list of identities (the "order"). Content listeners
//! and order listeners are independent: reordering fires only the order,
//! editing an item fires only the paths that changed.

use crate::error::{Result, WatchError};
use crate::observable::Observable;
use crate::types::{KeyPath, Unsubscribe};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use super::deep::{DeepContainer, Dispatch};

/// When item identities are checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Validation {
    Always,
    Never,
    /// Only in builds with `debug_assertions` (dev and test).
    #[default]
    DebugOnly,
}

impl Validation {
    pub fn enabled(self) -> bool {
        match self {
            Validation::Always => true,
            Validation::Never => false,
            Validation::DebugOnly => cfg!(debug_assertions),
        }
    }
}

/// Collection configuration.
#[derive(Clone, Debug)]
pub struct ItemsConfig {
    /// Field holding each item's identity.
    /// Default: "id"
    pub id_field: String,

    /// Whether bulk writes reject items without an identity. With
    /// validation off such items are dropped with a warning.
    pub validation: Validation,
}

impl Default for ItemsConfig {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            validation: Validation::default(),
        }
    }
}

impl ItemsConfig {
    pub fn with_id_field(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            ..Self::default()
        }
    }
}

/// Record key for an identity: strings as-is, anything else in its JSON
/// form. `1` and `"1"` therefore name the same item.
pub fn record_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

struct ItemsInner {
    config: ItemsConfig,
    content: DeepContainer,
    ids: Observable<Vec<Value>>,
    /// Writers hold it exclusively while `ids` and `content` change; reads
    /// spanning both hold it shared.
    gate: RwLock<()>,
}

/// An ordered list of items, each addressable by its identity.
///
/// Reads are in `ids` order. Every write leaves the order and the record
/// consistent before any listener runs; listeners may write back.
///
/// ```
/// use serde_json::json;
/// use watchtree::{ItemsConfig, OrderedCollection};
///
/// let todos = OrderedCollection::new(ItemsConfig::default());
/// todos.set_items(vec![json!({"id": 1, "done": false}), json!({"id": 2, "done": false})])?;
///
/// todos.set_at(watchtree::path![1, "done"], true)?;
/// todos.push(vec![json!({"id": 1, "done": true})])?; // moves item 1 to the end
///
/// assert_eq!(todos.ids(), vec![json!(2), json!(1)]);
/// # Ok::<(), watchtree::WatchError>(())
/// ```
#[derive(Clone)]
pub struct OrderedCollection {
    inner: Arc<ItemsInner>,
}

impl OrderedCollection {
    pub fn new(config: ItemsConfig) -> Self {
        Self {
            inner: Arc::new(ItemsInner {
                config,
                content: DeepContainer::new(),
                ids: Observable::new(Vec::new()),
                gate: RwLock::new(()),
            }),
        }
    }

    pub fn with_items(config: ItemsConfig, items: impl IntoIterator<Item = Value>) -> Result<Self> {
        let collection = Self::new(config);
        collection.set_items(items)?;
        Ok(collection)
    }

    pub fn config(&self) -> &ItemsConfig {
        &self.inner.config
    }

    // --- Writes ---

    /// Replace the whole collection.
    ///
    /// Duplicate identities collapse into one item: it keeps the position of
    /// the first occurrence and the value of the last. Order listeners fire
    /// only if the identity sequence changed; content listeners fire for the
    /// paths whose value changed. Returns whether anything changed.
    pub fn set_items(&self, items: impl IntoIterator<Item = Value>) -> Result<bool> {
        let items: Vec<Value> = items.into_iter().collect();
        self.write_items(|_| Ok(items))
    }

    /// Replace existing items from an identity-keyed map. Entries whose
    /// identity is not in the collection are ignored.
    pub fn update_record(&self, record: Map<String, Value>) -> Result<bool> {
        let guard = self.inner.gate.write();

        let members = self.member_keys();
        let mut next = self.inner.content.get_root();
        let mut applied = 0;
        if let Value::Object(current) = &mut next {
            for (key, item) in record {
                if members.contains(&key) {
                    current.insert(key, item);
                    applied += 1;
                }
            }
        }
        if applied == 0 {
            return Ok(false);
        }

        let dispatch = self.inner.content.commit_replace(next);
        drop(guard);
        Ok(Self::deliver(dispatch))
    }

    /// Replace the item with identity `id`. Ignored (returns `Ok(false)`)
    /// if `id` is not in the collection.
    pub fn set_item(&self, id: impl Into<Value>, item: Value) -> Result<bool> {
        let key = record_key(&id.into());
        self.set_at(KeyPath::from(key), item)
    }

    /// Write inside an item. The first key of `path` is the identity.
    ///
    /// Ignored (returns `Ok(false)`) if that identity is not in the
    /// collection, so a stale path cannot resurrect a deleted item. A root
    /// path takes an array (as [`set_items`](Self::set_items)) or an object
    /// (as [`update_record`](Self::update_record)).
    pub fn set_at(&self, path: impl Into<KeyPath>, value: impl Into<Value>) -> Result<bool> {
        let path = path.into();
        let value = value.into();

        let Some(first) = path.first() else {
            return match value {
                Value::Array(items) => self.set_items(items),
                Value::Object(record) => self.update_record(record),
                _ => Err(WatchError::PathConflict {
                    path,
                    reason: "collection root takes an array of items or a record".to_string(),
                }),
            };
        };

        let guard = self.inner.gate.write();
        if !self.member_keys().contains(&first.as_field()) {
            debug!(path = %path, "write to an item not in the collection ignored");
            return Ok(false);
        }
        let dispatch = self.inner.content.commit(&path, value)?;
        drop(guard);
        Ok(Self::deliver(dispatch))
    }

    /// Append items, moving any that are already present to the end.
    /// Returns the new length.
    pub fn push(&self, items: impl IntoIterator<Item = Value>) -> Result<usize> {
        let items: Vec<Value> = items.into_iter().collect();
        self.write_items(|this| {
            this.consistency()?;
            let pushed = this.keys_of(&items);
            let mut next = this.without(&pushed);
            next.extend(items);
            Ok(next)
        })?;
        Ok(self.len())
    }

    /// Prepend items, moving any that are already present to the front.
    /// Returns the new length.
    pub fn unshift(&self, items: impl IntoIterator<Item = Value>) -> Result<usize> {
        let mut items: Vec<Value> = items.into_iter().collect();
        self.write_items(|this| {
            this.consistency()?;
            let unshifted = this.keys_of(&items);
            items.extend(this.without(&unshifted));
            Ok(items)
        })?;
        Ok(self.len())
    }

    /// Remove items by identity or by item (its identity is used).
    pub fn delete(&self, ids_or_items: impl IntoIterator<Item = Value>) -> Result<bool> {
        let targets: HashSet<String> = ids_or_items
            .into_iter()
            .filter_map(|v| self.identity_of_arg(&v))
            .map(|id| record_key(&id))
            .collect();
        self.write_items(|this| Ok(this.without(&targets)))
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Result<Option<Value>> {
        let mut popped = None;
        self.write_items(|this| {
            let mut items = this.items();
            popped = items.pop();
            Ok(items)
        })?;
        Ok(popped)
    }

    /// Reverse the order. Item content is untouched.
    pub fn reverse(&self) -> Result<bool> {
        self.write_items(|this| {
            let mut items = this.items();
            items.reverse();
            Ok(items)
        })
    }

    /// Mutate record and order in place WITHOUT notifying anyone and
    /// without any consistency check. Follow with
    /// [`notify_all`](Self::notify_all).
    ///
    /// The collection is write-locked while `f` runs: reading it from
    /// inside `f` deadlocks.
    pub fn mutate_unnotified<R>(&self, f: impl FnOnce(&mut Value, &mut Vec<Value>) -> R) -> R {
        let _guard = self.inner.gate.write();
        let mut ids = self.inner.ids.get();
        let result = self.inner.content.mutate_unnotified(|record| f(record, &mut ids));
        self.inner.ids.set_silently(ids);
        result
    }

    /// Build the next full item list under the write lock, then validate,
    /// normalize and commit it.
    fn write_items(&self, build: impl FnOnce(&Self) -> Result<Vec<Value>>) -> Result<bool> {
        let guard = self.inner.gate.write();

        let items = build(self)?;
        if self.inner.config.validation.enabled() {
            self.validate(&items)?;
        }
        let (ids, record) = self.normalize(items);

        let order_changed = self.inner.ids.set_silently(ids);
        let dispatch = self.inner.content.commit_replace(Value::Object(record));
        drop(guard);

        let content_changed = Self::deliver(dispatch);
        if order_changed {
            debug!(len = self.len(), "collection order changed");
            self.inner.ids.notify();
        }
        Ok(order_changed || content_changed)
    }

    fn deliver(dispatch: Option<Dispatch>) -> bool {
        match dispatch {
            Some(dispatch) => {
                dispatch.deliver();
                true
            }
            None => false,
        }
    }

    fn identity<'a>(&self, item: &'a Value) -> Option<&'a Value> {
        item.get(&self.inner.config.id_field)
            .filter(|id| !id.is_null())
    }

    fn identity_of_arg(&self, value: &Value) -> Option<Value> {
        if value.is_object() {
            self.identity(value).cloned()
        } else if value.is_null() {
            None
        } else {
            Some(value.clone())
        }
    }

    fn keys_of(&self, items: &[Value]) -> HashSet<String> {
        items
            .iter()
            .filter_map(|item| self.identity(item))
            .map(record_key)
            .collect()
    }

    fn member_keys(&self) -> HashSet<String> {
        self.inner.ids.with(|ids| ids.iter().map(record_key).collect())
    }

    /// Current items, minus those whose key is in `excluded`.
    fn without(&self, excluded: &HashSet<String>) -> Vec<Value> {
        self.items()
            .into_iter()
            .filter(|item| {
                self.identity(item)
                    .map(|id| !excluded.contains(&record_key(id)))
                    .unwrap_or(true)
            })
            .collect()
    }

    fn validate(&self, items: &[Value]) -> Result<()> {
        let Some(index) = items.iter().position(|item| self.identity(item).is_none()) else {
            return Ok(());
        };
        Err(WatchError::InvalidItem {
            index,
            field: self.inner.config.id_field.clone(),
            ids: render_ids(items.iter().map(|item| self.identity(item))),
        })
    }

    fn normalize(&self, items: Vec<Value>) -> (Vec<Value>, Map<String, Value>) {
        let mut ids = Vec::with_capacity(items.len());
        let mut record = Map::new();

        for (index, item) in items.into_iter().enumerate() {
            let Some(id) = self.identity(&item).cloned() else {
                warn!(index, field = %self.inner.config.id_field, "item without identity dropped");
                continue;
            };
            let key = record_key(&id);
            if !record.contains_key(&key) {
                ids.push(id);
            }
            record.insert(key, item);
        }

        (ids, record)
    }

    /// Every identity has exactly one backing item and vice versa.
    pub fn check_consistency(&self) -> Result<()> {
        let _gate = self.inner.gate.read();
        self.consistency()
    }

    fn consistency(&self) -> Result<()> {
        let ids = self.inner.ids.get();
        self.inner.content.with((), |record| {
            let keys: Vec<&String> = match record {
                Some(Value::Object(map)) => map.keys().collect(),
                _ => Vec::new(),
            };
            let missing = ids
                .iter()
                .position(|id| !keys.contains(&&record_key(id)));
            if missing.is_none() && keys.len() == ids.len() {
                return Ok(());
            }

            let message = format!(
                "ids and items disagree{}\n\tids: {}\n\titems: {{{}}}",
                missing
                    .map(|index| format!(" at index {index}"))
                    .unwrap_or_default(),
                render_ids(ids.iter().map(Some)),
                keys.iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            warn!(%message, "collection consistency violated");
            Err(WatchError::Inconsistent(message))
        })
    }

    // --- Reads ---

    /// Items in order.
    pub fn array(&self) -> Vec<Value> {
        let _gate = self.inner.gate.read();
        self.items()
    }

    /// [`array`](Self::array) for callers already holding the gate.
    fn items(&self) -> Vec<Value> {
        let ids = self.inner.ids.get();
        self.inner
            .content
            .with((), |record| record.map(|r| materialize(r, &ids)).unwrap_or_default())
    }

    pub fn len(&self) -> usize {
        self.inner.ids.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<Value> {
        self.inner.ids.get()
    }

    /// The identity-keyed record.
    pub fn record(&self) -> Value {
        self.inner.content.get_root()
    }

    /// Value at `path` inside the record; the first key is the identity.
    pub fn get(&self, path: impl Into<KeyPath>) -> Option<Value> {
        self.inner.content.get(path)
    }

    pub fn get_item(&self, id: impl Into<Value>) -> Option<Value> {
        self.inner.content.get(KeyPath::from(record_key(&id.into())))
    }

    pub fn first(&self) -> Option<Value> {
        let _gate = self.inner.gate.read();
        let id = self.inner.ids.with(|ids| ids.first().cloned())?;
        self.get_item(id)
    }

    pub fn last(&self) -> Option<Value> {
        let _gate = self.inner.gate.read();
        let id = self.inner.ids.with(|ids| ids.last().cloned())?;
        self.get_item(id)
    }

    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.array().into_iter()
    }

    pub fn find(&self, mut predicate: impl FnMut(&Value) -> bool) -> Option<Value> {
        self.array().into_iter().find(|item| predicate(item))
    }

    pub fn find_index(&self, predicate: impl FnMut(&Value) -> bool) -> Option<usize> {
        self.array().iter().position(predicate)
    }

    /// Whether an identity (or an item's identity) is in the collection.
    pub fn includes(&self, id_or_item: &Value) -> bool {
        self.index_of(id_or_item).is_some()
    }

    pub fn index_of(&self, id_or_item: &Value) -> Option<usize> {
        let key = record_key(&self.identity_of_arg(id_or_item)?);
        self.inner
            .ids
            .with(|ids| ids.iter().position(|id| record_key(id) == key))
    }

    /// Identities are unique, so this agrees with [`index_of`](Self::index_of).
    pub fn last_index_of(&self, id_or_item: &Value) -> Option<usize> {
        let key = record_key(&self.identity_of_arg(id_or_item)?);
        self.inner
            .ids
            .with(|ids| ids.iter().rposition(|id| record_key(id) == key))
    }

    pub fn every(&self, predicate: impl FnMut(&Value) -> bool) -> bool {
        self.array().iter().all(predicate)
    }

    pub fn some(&self, predicate: impl FnMut(&Value) -> bool) -> bool {
        self.array().iter().any(predicate)
    }

    pub fn filter(&self, mut predicate: impl FnMut(&Value) -> bool) -> Vec<Value> {
        self.array().into_iter().filter(|item| predicate(item)).collect()
    }

    pub fn for_each(&self, mut f: impl FnMut(&Value, usize)) {
        for (index, item) in self.array().iter().enumerate() {
            f(item, index);
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&Value, usize) -> U) -> Vec<U> {
        self.array()
            .iter()
            .enumerate()
            .map(|(index, item)| f(item, index))
            .collect()
    }

    // --- Subscriptions ---

    /// Listen to one item's content.
    pub fn subscribe_item(
        &self,
        id: impl Into<Value>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.inner
            .content
            .subscribe(KeyPath::from(record_key(&id.into())), listener)
    }

    /// Listen to a path inside the record; the first key is the identity.
    pub fn subscribe_at(
        &self,
        path: impl Into<KeyPath>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.inner.content.subscribe(path, listener)
    }

    /// Listen to any content change, receiving the whole record.
    pub fn subscribe_record(&self, listener: impl Fn(&Value) + Send + Sync + 'static) -> Unsubscribe {
        self.inner.content.subscribe((), listener)
    }

    /// Listen to any content change, receiving the record, the items in
    /// order and the identities.
    pub fn subscribe_items(
        &self,
        listener: impl Fn(&Value, &[Value], &[Value]) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let inner: Weak<ItemsInner> = Arc::downgrade(&self.inner);
        self.inner.content.subscribe((), move |_| {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let (record, ids) = {
                let _gate = inner.gate.read();
                (inner.content.get_root(), inner.ids.get())
            };
            let items = materialize(&record, &ids);
            listener(&record, &items, &ids);
        })
    }

    /// Listen to changes of the identity sequence (inserts, removals,
    /// reorders).
    pub fn subscribe_order(&self, listener: impl Fn(&Vec<Value>) + Send + Sync + 'static) -> Unsubscribe {
        self.inner.ids.subscribe(listener)
    }

    /// Re-announce every content path and the order.
    pub fn notify_all(&self) {
        self.inner.content.notify_all();
        self.inner.ids.notify();
    }
}

impl Default for OrderedCollection {
    fn default() -> Self {
        Self::new(ItemsConfig::default())
    }
}

impl<'a> IntoIterator for &'a OrderedCollection {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for OrderedCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedCollection")
            .field("id_field", &self.inner.config.id_field)
            .field("ids", &self.inner.ids.get())
            .finish()
    }
}

fn materialize(record: &Value, ids: &[Value]) -> Vec<Value> {
    ids.iter()
        .filter_map(|id| record.get(record_key(id)).cloned())
        .collect()
}

fn render_ids<'a>(ids: impl Iterator<Item = Option<&'a Value>>) -> String {
    ids.map(|id| id.map(record_key).unwrap_or_else(|| "null".to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}
