//! Infrastructure layer: state, locking and wiring of the portal components.
//!
//! Domain crates decide; this crate stores, serializes concurrent access and
//! emits events. Components are built by [`Portal`] and shared through it.

pub mod catalog_store;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod environments;
pub mod events;
pub mod index;
pub mod locks;
pub mod portal;
pub mod registry;
pub mod secrets;
pub mod store;

pub use catalog_store::CatalogStore;
pub use config::PortalConfig;
pub use credentials::CredentialManager;
pub use engine::{Entitlements, EntitlementEngine};
pub use environments::EnvironmentDirectory;
pub use events::{EnvironmentEvent, EventSink, PortalEnvelope, PortalEvent};
pub use index::{CatalogIndex, CategoryListing};
pub use portal::{Portal, SYSTEM_ACTOR};
pub use registry::ApplicationRegistry;
pub use store::SubscriptionFilter;
