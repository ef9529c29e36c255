//! Subscription types handed out by the path registry.

use crate::types::{KeyPath, Listener};
use serde_json::Value;

/// How a registered path relates to the path being written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// Registered path is a strict prefix of the written path.
    Ancestor,
    /// Same path.
    Exact,
    /// Registered path extends the written path.
    Descendant,
}

impl Relation {
    /// Relation of `registered` to `written`, if they are related at all.
    pub fn between(registered: &KeyPath, written: &KeyPath) -> Option<Self> {
        if registered == written {
            Some(Relation::Exact)
        } else if registered.is_ancestor_of(written) {
            Some(Relation::Ancestor)
        } else if registered.is_descendant_of(written) {
            Some(Relation::Descendant)
        } else {
            None
        }
    }
}

/// A registry entry captured at one point in time: its path and a copy of
/// its listeners.
#[derive(Clone)]
pub struct RelatedEntry {
    pub path: KeyPath,
    pub relation: Relation,
    pub(crate) listeners: Vec<Listener<Value>>,
}

impl RelatedEntry {
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver `value` to every captured listener.
    pub fn notify(&self, value: &Value) {
        for listener in &self.listeners {
            listener(value);
        }
    }
}

impl std::fmt::Debug for RelatedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelatedEntry")
            .field("path", &self.path)
            .field("relation", &self.relation)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
