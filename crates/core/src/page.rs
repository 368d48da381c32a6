//! Paging parameters and bounded result pages for list operations.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Sort direction of a list request.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Apply the direction to an ascending comparison result.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// A list request: page offset, page limit, sort field and sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub offset: u32,
    pub limit: u32,
    #[serde(default)]
    pub sort_field: Option<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
            sort_field: None,
            sort_order: SortOrder::Asc,
        }
    }
}

impl PageRequest {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit,
            ..Self::default()
        }
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_field = Some(field.into());
        self.sort_order = order;
        self
    }

    /// Reject a zero limit or a limit above `max_limit`.
    pub fn validate(&self, max_limit: u32) -> DomainResult<()> {
        if self.limit == 0 {
            return Err(DomainError::validation("page limit must be greater than zero"));
        }
        if self.limit > max_limit {
            return Err(DomainError::validation(format!(
                "page limit {} exceeds the maximum of {max_limit}",
                self.limit
            )));
        }
        Ok(())
    }

    /// Resolve the sort field against the fields a listing supports.
    ///
    /// Returns `default` when no field was requested.
    pub fn sort_field_in<'a>(&'a self, allowed: &[&'a str], default: &'a str) -> DomainResult<&'a str> {
        match self.sort_field.as_deref() {
            None | Some("") => Ok(default),
            Some(field) if allowed.contains(&field) => Ok(field),
            Some(field) => Err(DomainError::validation(format!(
                "unknown sort field '{field}' (expected one of: {})",
                allowed.join(", ")
            ))),
        }
    }

    /// Cut one page out of an already sorted sequence.
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect();
        Page {
            items,
            total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

/// A bounded page of results plus the total count across all pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        (self.offset as u64 + self.items.len() as u64) < self.total
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}
