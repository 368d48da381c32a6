//! Entitlement domain module.
//!
//! A subscription binds one application to one product within one
//! environment. It is owned by neither side and only references both by id.

pub mod event;
pub mod subscription;

pub use event::SubscriptionEvent;
pub use subscription::{EntitlementKey, SlotKey, Subscription};
