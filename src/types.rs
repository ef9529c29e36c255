//! Core types shared by every container: keys, key-paths and teardown handles.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One step into a nested value.
///
/// `Index` addresses an array slot, `Field` an object member. Integer
/// literals convert to `Index`, strings to `Field`.
///
/// Keys compare by the location they name: `Field("3")` and `Index(3)` are
/// the same key, `Field("03")` is not.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Index(usize),
    Field(String),
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Canonical<'a> {
    Index(usize),
    Field(&'a str),
}

impl Key {
    /// The array slot this key addresses, if any.
    ///
    /// A `Field` whose text is a plain decimal number also addresses a slot.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Field(name) => parse_index(name),
        }
    }

    /// The object member name this key addresses.
    pub fn as_field(&self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Field(name) => name.clone(),
        }
    }

    fn canonical(&self) -> Canonical<'_> {
        match self {
            Key::Index(i) => Canonical::Index(*i),
            Key::Field(name) => match parse_index(name) {
                Some(i) => Canonical::Index(i),
                None => Canonical::Field(name),
            },
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.canonical().cmp(&other.canonical())
    }
}

impl std::hash::Hash for Key {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical().hash(state)
    }
}

fn parse_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{}", i),
            Key::Field(name) => write!(f, "{:?}", name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "[{}]", i),
            Key::Field(name) => write!(f, ".{}", name),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Field(name.clone())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<u32> for Key {
    fn from(index: u32) -> Self {
        Key::Index(index as usize)
    }
}

impl From<u64> for Key {
    fn from(index: u64) -> Self {
        Key::Index(index as usize)
    }
}

/// Unsuffixed integer literals land here. Negative numbers are not slots,
/// so they become member names.
impl From<i32> for Key {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(i) => Key::Index(i),
            Err(_) => Key::Field(index.to_string()),
        }
    }
}

impl From<i64> for Key {
    fn from(index: i64) -> Self {
        match usize::try_from(index) {
            Ok(i) => Key::Index(i),
            Err(_) => Key::Field(index.to_string()),
        }
    }
}

/// An ordered sequence of keys locating a value inside a nested structure.
///
/// The empty path is the root. Paths compare structurally, so two paths
/// built separately from the same keys are the same path.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(Vec<Key>);

impl KeyPath {
    /// The root path.
    pub fn root() -> Self {
        KeyPath(Vec::new())
    }

    pub fn new(keys: Vec<Key>) -> Self {
        KeyPath(keys)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    pub fn first(&self) -> Option<&Key> {
        self.0.first()
    }

    /// True if `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &KeyPath) -> bool {
        self.0.len() <= other.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// True if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &KeyPath) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// True if `self` is a strict descendant of `other`.
    pub fn is_descendant_of(&self, other: &KeyPath) -> bool {
        other.is_ancestor_of(self)
    }

    /// Ancestor, equal or descendant.
    pub fn is_related_to(&self, other: &KeyPath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// The keys left after removing `prefix`, if it is one.
    pub fn strip_prefix(&self, prefix: &KeyPath) -> Option<KeyPath> {
        if prefix.is_prefix_of(self) {
            Some(KeyPath(self.0[prefix.0.len()..].to_vec()))
        } else {
            None
        }
    }
}

impl fmt::Debug for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for key in &self.0 {
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

impl From<()> for KeyPath {
    fn from(_: ()) -> Self {
        KeyPath::root()
    }
}

impl From<Key> for KeyPath {
    fn from(key: Key) -> Self {
        KeyPath(vec![key])
    }
}

impl From<&KeyPath> for KeyPath {
    fn from(path: &KeyPath) -> Self {
        path.clone()
    }
}

impl From<&str> for KeyPath {
    fn from(name: &str) -> Self {
        KeyPath(vec![Key::from(name)])
    }
}

impl From<String> for KeyPath {
    fn from(name: String) -> Self {
        KeyPath(vec![Key::Field(name)])
    }
}

impl From<usize> for KeyPath {
    fn from(index: usize) -> Self {
        KeyPath(vec![Key::Index(index)])
    }
}

impl<K: Into<Key>> From<Vec<K>> for KeyPath {
    fn from(keys: Vec<K>) -> Self {
        KeyPath(keys.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<Key>, const N: usize> From<[K; N]> for KeyPath {
    fn from(keys: [K; N]) -> Self {
        KeyPath(keys.into_iter().map(Into::into).collect())
    }
}

impl From<&[Key]> for KeyPath {
    fn from(keys: &[Key]) -> Self {
        KeyPath(keys.to_vec())
    }
}

impl FromIterator<Key> for KeyPath {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        KeyPath(iter.into_iter().collect())
    }
}

/// Build a [`KeyPath`] from mixed keys.
///
/// ```
/// use watchtree::{path, Key, KeyPath};
///
/// let p = path!["todos", 3, "title"];
/// assert_eq!(p.keys()[1], Key::Index(3));
/// assert_eq!(path![], KeyPath::root());
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::KeyPath::root()
    };
    ($($key:expr),+ $(,)?) => {
        $crate::KeyPath::new(vec![$($crate::Key::from($key)),+])
    };
}

/// Identifier of one listener registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// A change listener. Receives the value it subscribed to after a change.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A zero-argument callback used to signal "something upstream changed".
pub type Trigger = Arc<dyn Fn() + Send + Sync>;

type TeardownFn = Box<dyn FnOnce() + Send>;

/// Handle that releases a subscription.
///
/// Calling it more than once is safe: only the first call runs the teardown.
/// Clones share the same teardown, so any clone can release it.
/// Dropping the handle does NOT unsubscribe.
#[must_use = "dropping an Unsubscribe keeps the subscription alive; call it to release"]
#[derive(Clone)]
pub struct Unsubscribe(Arc<Mutex<Option<TeardownFn>>>);

impl Unsubscribe {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Unsubscribe(Arc::new(Mutex::new(Some(Box::new(teardown)))))
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Unsubscribe(Arc::new(Mutex::new(None)))
    }

    /// Run the teardown. Returns false if it already ran.
    pub fn call(&self) -> bool {
        // Taken out before running so a teardown that re-enters this handle
        // sees it as spent.
        let teardown = self.0.lock().take();
        match teardown {
            Some(teardown) => {
                teardown();
                true
            }
            None => false,
        }
    }

    /// True until the teardown has run.
    pub fn is_active(&self) -> bool {
        self.0.lock().is_some()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_path_macro_mixes_keys() {
        let p = path!["a", 0, "b"];
        assert_eq!(
            p.keys(),
            &[Key::from("a"), Key::Index(0), Key::Field("b".to_string())]
        );
        assert_eq!(p.to_string(), "$.a[0].b");
    }

    #[test]
    fn test_structural_equality() {
        let a = KeyPath::from(["x", "y"]);
        let b = KeyPath::from(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, KeyPath::from(["x"]));
    }

    #[test]
    fn test_prefix_relations() {
        let root = KeyPath::root();
        let a = path!["a"];
        let ab = path!["a", "b"];
        let c = path!["c"];

        assert!(root.is_ancestor_of(&a));
        assert!(a.is_ancestor_of(&ab));
        assert!(ab.is_descendant_of(&root));
        assert!(!a.is_ancestor_of(&a));
        assert!(a.is_prefix_of(&a));
        assert!(ab.is_related_to(&a));
        assert!(!ab.is_related_to(&c));
        assert_eq!(ab.strip_prefix(&a), Some(path!["b"]));
        assert_eq!(c.strip_prefix(&a), None);
    }

    #[test]
    fn test_key_index_parsing() {
        assert_eq!(Key::from("3").as_index(), Some(3));
        assert_eq!(Key::from("03").as_index(), None);
        assert_eq!(Key::from("x").as_index(), None);
        assert_eq!(Key::from(-1).as_field(), "-1");
        assert_eq!(Key::Index(7).as_field(), "7");
    }

    #[test]
    fn test_numeric_field_is_same_key_as_index() {
        assert_eq!(Key::from("3"), Key::Index(3));
        assert_ne!(Key::from("03"), Key::Index(3));
        assert_eq!(path![1, "done"], KeyPath::from(vec!["1", "done"]));
        assert!(path!["1"].is_ancestor_of(&path![1, "done"]));
    }

    #[test]
    fn test_unsubscribe_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let unsubscribe = Unsubscribe::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let clone = unsubscribe.clone();

        assert!(unsubscribe.is_active());
        assert!(unsubscribe.call());
        assert!(!clone.call());
        assert!(!unsubscribe.is_active());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_unsubscribe() {
        let unsubscribe = Unsubscribe::noop();
        assert!(!unsubscribe.is_active());
        assert!(!unsubscribe.call());
    }
}
