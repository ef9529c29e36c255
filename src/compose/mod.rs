//! Composition: several upstream subscriptions combined into one handle,
//! and values derived from them.
//!
//! A `listen` function receives a [`Trigger`](crate::Trigger), wires it into
//! any number of sources and returns whatever handles it got back as a
//! [`Teardown`]. The composition helpers flatten those into one idempotent
//! [`Unsubscribe`](crate::Unsubscribe).

mod derived;
mod subscription;

pub use derived::{Derived, DynamicDerived};
pub use subscription::{
    composed_handler, composed_subscription, hydrated_composed_handler,
    hydrated_composed_subscription, hydrated_subscription, try_composed_subscription, Teardown,
};
