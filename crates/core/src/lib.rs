//! `devportal-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog,
//! application and entitlement crates (no infrastructure concerns).

pub mod aggregate;
pub mod environment;
pub mod error;
pub mod id;
pub mod page;
pub mod value_object;
pub mod version;

pub use aggregate::AggregateRoot;
pub use environment::{Environment, EnvironmentKind};
pub use error::{DomainError, DomainResult};
pub use id::{
    ApplicationId, CategoryId, EndpointId, EnvironmentId, ProductId, SubscriptionId, TagId, UserId,
};
pub use page::{Page, PageRequest, SortOrder};
pub use value_object::ValueObject;
pub use version::ProductVersion;
