//! Keyed in-memory storage used by the portal components.

pub mod keyed_store;
pub mod subscriptions;

pub use keyed_store::{InMemoryKeyedStore, KeyedStore};
pub use subscriptions::{SubscriptionFilter, SubscriptionStore};

use core::cmp::Ordering;
use std::sync::PoisonError;

use devportal_core::{DomainError, DomainResult, Page, PageRequest};

/// Upper bound on page size when a component is not configured otherwise.
pub const DEFAULT_MAX_PAGE_LIMIT: u32 = 1000;

/// Map a poisoned lock to a storage failure.
pub(crate) fn poisoned<T>(what: &'static str) -> impl FnOnce(PoisonError<T>) -> DomainError {
    move |_| DomainError::internal(format!("{what} lock poisoned"))
}

/// Validate `request`, sort `items` by the requested field and cut one page.
///
/// `fields[0]` is the default sort field. `compare` receives the resolved
/// field name and must order ascending; the request's sort order is applied
/// on top.
pub(crate) fn sorted_page<T>(
    mut items: Vec<T>,
    request: &PageRequest,
    max_limit: u32,
    fields: &[&'static str],
    compare: impl Fn(&str, &T, &T) -> Ordering,
) -> DomainResult<Page<T>> {
    request.validate(max_limit)?;
    let default = fields.first().copied().unwrap_or_default();
    let field = request.sort_field_in(fields, default)?;
    items.sort_by(|a, b| request.sort_order.apply(compare(field, a, b)));
    Ok(request.paginate(items))
}
