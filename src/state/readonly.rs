//! Read-only view of a deep container.

use crate::error::Result;
use crate::types::{KeyPath, Unsubscribe};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::deep::DeepContainer;

/// A [`DeepContainer`] handle without write access.
///
/// Shares the value and subscriptions of the container it was made from;
/// hand it out where state should be observed but never written.
///
/// ```
/// use serde_json::json;
/// use watchtree::{path, DeepContainer};
///
/// let state = DeepContainer::with_value(json!({"user": {"name": "Ada"}}));
/// let view = state.readonly();
///
/// state.set(path!["user", "name"], "Grace")?;
/// assert_eq!(view.get(path!["user", "name"]), Some(json!("Grace")));
/// # Ok::<(), watchtree::WatchError>(())
/// ```
#[derive(Clone, Debug)]
pub struct ReadonlyDeep {
    container: DeepContainer,
}

impl ReadonlyDeep {
    pub fn get(&self, path: impl Into<KeyPath>) -> Option<Value> {
        self.container.get(path)
    }

    pub fn get_root(&self) -> Value {
        self.container.get_root()
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: impl Into<KeyPath>) -> Result<Option<T>> {
        self.container.get_as(path)
    }

    pub fn with<R>(&self, path: impl Into<KeyPath>, f: impl FnOnce(Option<&Value>) -> R) -> R {
        self.container.with(path, f)
    }

    pub fn subscribe(
        &self,
        path: impl Into<KeyPath>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.container.subscribe(path, listener)
    }

    pub fn handle(
        &self,
        path: impl Into<KeyPath>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.container.handle(path, listener)
    }

    pub fn has_subscribers(&self, path: impl Into<KeyPath>) -> bool {
        self.container.has_subscribers(path)
    }
}

impl From<DeepContainer> for ReadonlyDeep {
    fn from(container: DeepContainer) -> Self {
        Self { container }
    }
}

impl DeepContainer {
    /// A handle on the same state that can read and subscribe but not write.
    pub fn readonly(&self) -> ReadonlyDeep {
        ReadonlyDeep::from(self.clone())
    }
}
