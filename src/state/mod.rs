//! Stateful containers.
//!
//! [`DeepContainer`] holds one nested value and notifies listeners by
//! key-path; [`ReadonlyDeep`] is its read-and-subscribe view.
//! [`OrderedCollection`] layers an ordered identity list on top of one,
//! keyed by each item's identity field.

mod deep;
mod items;
pub mod operations;
mod readonly;

pub use deep::DeepContainer;
pub use items::{record_key, ItemsConfig, OrderedCollection, Validation};
pub use readonly::ReadonlyDeep;
