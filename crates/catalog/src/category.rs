//! Lightweight named groupings used purely for indexing.

use serde::{Deserialize, Serialize};

use devportal_core::{CategoryId, DomainError, DomainResult, TagId};

/// Normalize a free-form tag name (trimmed, lower-case).
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() { None } else { Some(tag) }
}

fn require_name(kind: &str, name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation(format!("{kind} name cannot be empty")));
    }
    Ok(name.to_string())
}

/// Input for a new product category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent: Option<CategoryId>,
    #[serde(default)]
    pub url_alias: Option<String>,
    #[serde(default)]
    pub weight: i32,
}

/// A product category. Lower weight sorts first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCategory {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub parent: Option<CategoryId>,
    pub url_alias: Option<String>,
    pub weight: i32,
}

impl ProductCategory {
    /// Parent existence is checked by the store, which sees all categories.
    pub fn create(id: CategoryId, spec: NewCategory) -> DomainResult<Self> {
        let name = require_name("category", &spec.name)?;
        if spec.parent == Some(id) {
            return Err(DomainError::validation("category cannot be its own parent"));
        }
        Ok(Self {
            id,
            name,
            description: spec.description,
            parent: spec.parent,
            url_alias: spec.url_alias,
            weight: spec.weight,
        })
    }
}

/// A tag that can be attached to API endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTag {
    pub id: TagId,
    pub name: String,
}

impl ApiTag {
    pub fn create(id: TagId, name: &str) -> DomainResult<Self> {
        let name = normalize_tag(name)
            .ok_or_else(|| DomainError::validation("api tag name cannot be empty"))?;
        Ok(Self { id, name })
    }
}

/// A tag that can be attached to products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTag {
    pub id: TagId,
    pub name: String,
}

impl ProductTag {
    pub fn create(id: TagId, name: &str) -> DomainResult<Self> {
        let name = normalize_tag(name)
            .ok_or_else(|| DomainError::validation("product tag name cannot be empty"))?;
        Ok(Self { id, name })
    }
}
