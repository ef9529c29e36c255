//! # watchtree
//!
//! Observable state containers with precise, key-path based change
//! notification.
//!
//! ## Core Concepts
//!
//! - **Deep containers**: one nested value; a write at a path notifies the
//!   listeners on that path, its ancestors and its descendants, each with
//!   its own slice and only if that slice changed
//! - **Ordered collections**: identifiable items kept in order, with
//!   content and order observed separately
//! - **Composition**: many upstream subscriptions behind one idempotent
//!   handle, and read-only values derived from them
//! - **Bindings**: adapters that tie subscriptions to a host render loop
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use watchtree::{path, DeepContainer};
//!
//! let state = DeepContainer::with_value(json!({"user": {"name": "Ada", "visits": 1}}));
//!
//! let unsubscribe = state.subscribe(path!["user"], |user| println!("user: {user}"));
//!
//! // Equal value: nothing happens.
//! assert!(!state.set(path!["user", "name"], "Ada")?);
//!
//! // Fires the `user` listener with the whole updated user.
//! assert!(state.set(path!["user", "visits"], 2)?);
//!
//! unsubscribe.call();
//! # Ok::<(), watchtree::WatchError>(())
//! ```
//!
//! Listeners run synchronously, after every lock is released, so a listener
//! may freely write to any container, including the one notifying it.

pub mod binding;
pub mod compose;
pub mod error;
pub mod event;
pub mod observable;
pub mod state;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use binding::{ClearedMemo, ComposedValueBinding, PathBinding};
pub use compose::{
    composed_handler, composed_subscription, hydrated_composed_handler,
    hydrated_composed_subscription, hydrated_subscription, try_composed_subscription, Derived,
    DynamicDerived, Teardown,
};
pub use error::{Result, WatchError};
pub use event::EventBus;
pub use observable::Observable;
pub use state::{
    record_key, DeepContainer, ItemsConfig, OrderedCollection, ReadonlyDeep, Validation,
};
pub use subscriptions::{Notifier, PathNotifier, RelatedEntry, Relation};
pub use types::*;
