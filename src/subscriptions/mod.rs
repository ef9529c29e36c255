//! Listener registries.
//!
//! - [`Notifier`]: a flat, ordered listener set for one value.
//! - [`PathNotifier`]: listener sets keyed by [`KeyPath`](crate::KeyPath),
//!   with the ancestor/exact/descendant query deep notification is built on.
//!
//! Both copy their listeners before delivering, so listeners may subscribe,
//! unsubscribe or write to containers while being notified.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use watchtree::{path, PathNotifier};
//!
//! let notifier = PathNotifier::new();
//! let unsubscribe = notifier.subscribe(path!["user", "name"], |name| println!("{name}"));
//!
//! assert_eq!(notifier.related(&path!["user"]).len(), 1);
//! notifier.notify(&path!["user", "name"], &json!("Ada"));
//!
//! unsubscribe.call();
//! assert!(notifier.is_empty());
//! ```

mod notifier;
mod registry;
mod types;

pub use notifier::Notifier;
pub use registry::PathNotifier;
pub use types::{RelatedEntry, Relation};
