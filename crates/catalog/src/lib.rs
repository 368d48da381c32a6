//! Catalog domain module.
//!
//! Published API products, the endpoints they own, and the category/tag
//! groupings used to browse them. Pure domain logic: no IO, no locking.

pub mod category;
pub mod endpoint;
pub mod event;
pub mod product;

pub use category::{ApiTag, NewCategory, ProductCategory, ProductTag, normalize_tag};
pub use endpoint::{ApiCoordinates, ApiEndpoint, ApiScopes, NewEndpoint};
pub use event::CatalogEvent;
pub use product::{NewProduct, Product, ProductPatch};
