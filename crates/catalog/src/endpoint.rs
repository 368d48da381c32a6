use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use devportal_core::{
    AggregateRoot, DomainError, DomainResult, EndpointId, EnvironmentKind, ProductId,
    ProductVersion, ValueObject,
};

use crate::category::normalize_tag;

/// Where an API lives: context (base path), resource and optional upstream reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiCoordinates {
    pub context: String,
    pub resource: String,
    #[serde(default)]
    pub reference_id: Option<String>,
}

impl ValueObject for ApiCoordinates {}

impl ApiCoordinates {
    /// Collision key across the live catalog: case-insensitive, slashes trimmed.
    pub fn path_key(&self) -> (String, String) {
        (normalize_path(&self.context), normalize_path(&self.resource))
    }
}

fn normalize_path(s: &str) -> String {
    s.trim().trim_matches('/').to_lowercase()
}

/// OAuth scopes an endpoint requires, one string per environment kind.
///
/// The two values are independent: setting one never touches the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiScopes {
    #[serde(default)]
    pub development: Option<String>,
    #[serde(default)]
    pub production: Option<String>,
}

impl ValueObject for ApiScopes {}

impl ApiScopes {
    pub fn get(&self, kind: EnvironmentKind) -> Option<&str> {
        match kind {
            EnvironmentKind::Development => self.development.as_deref(),
            EnvironmentKind::Production => self.production.as_deref(),
        }
    }

    pub fn with(&self, kind: EnvironmentKind, scope: Option<String>) -> Self {
        let mut next = self.clone();
        match kind {
            EnvironmentKind::Development => next.development = scope,
            EnvironmentKind::Production => next.production = scope,
        }
        next
    }
}

/// Input for a new endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEndpoint {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub api: ApiCoordinates,
    #[serde(default)]
    pub scopes: ApiScopes,
    #[serde(default)]
    pub security: Option<String>,
    #[serde(default)]
    pub endpoint_urls: Option<String>,
    /// Opaque documentation body, passed through untouched.
    #[serde(default)]
    pub documentation: Option<String>,
    /// Opaque API description document, passed through untouched.
    #[serde(default)]
    pub swagger: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub version: Option<ProductVersion>,
}

impl NewEndpoint {
    pub fn new(name: impl Into<String>, context: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            api: ApiCoordinates {
                context: context.into(),
                resource: resource.into(),
                reference_id: None,
            },
            scopes: ApiScopes::default(),
            security: None,
            endpoint_urls: None,
            documentation: None,
            swagger: None,
            tags: Vec::new(),
            version: None,
        }
    }
}

/// An API endpoint, owned by exactly one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub id: EndpointId,
    pub product_id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub api: ApiCoordinates,
    pub scopes: ApiScopes,
    pub security: Option<String>,
    pub endpoint_urls: Option<String>,
    pub documentation: Option<String>,
    pub swagger: Option<String>,
    pub deprecated: bool,
    pub tags: BTreeSet<String>,
    pub version: ProductVersion,
    pub revision: u64,
    pub updated: DateTime<Utc>,
}

impl ApiEndpoint {
    pub fn create(
        id: EndpointId,
        product_id: ProductId,
        spec: NewEndpoint,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("endpoint name cannot be empty"));
        }
        let (context, resource) = spec.api.path_key();
        if context.is_empty() {
            return Err(DomainError::validation("endpoint api context cannot be empty"));
        }
        if resource.is_empty() {
            return Err(DomainError::validation("endpoint api resource cannot be empty"));
        }
        if spec.version == Some(ProductVersion::MAX) {
            return Err(DomainError::validation(format!(
                "endpoint version {} leaves no room for later changes",
                ProductVersion::MAX
            )));
        }

        Ok(Self {
            id,
            product_id,
            name: name.to_string(),
            description: spec.description,
            api: spec.api,
            scopes: spec.scopes,
            security: spec.security,
            endpoint_urls: spec.endpoint_urls,
            documentation: spec.documentation,
            swagger: spec.swagger,
            deprecated: false,
            tags: spec.tags.iter().filter_map(|t| normalize_tag(t)).collect(),
            version: spec.version.unwrap_or_default(),
            revision: 1,
            updated: now,
        })
    }

    pub fn scope_for(&self, kind: EnvironmentKind) -> Option<&str> {
        self.scopes.get(kind)
    }

    /// Replace the scope for one environment kind.
    pub fn set_scope(
        &mut self,
        kind: EnvironmentKind,
        scope: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let scope = scope.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.bump(now)?;
        self.scopes = self.scopes.with(kind, scope);
        Ok(())
    }

    /// Returns `false` if the endpoint was already deprecated.
    pub fn deprecate(&mut self, now: DateTime<Utc>) -> DomainResult<bool> {
        if self.deprecated {
            return Ok(false);
        }
        self.bump(now)?;
        self.deprecated = true;
        Ok(true)
    }

    fn bump(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.version = self.version.bump_patch()?;
        self.revision += 1;
        self.updated = now.max(self.updated);
        Ok(())
    }
}

impl AggregateRoot for ApiEndpoint {
    type Id = EndpointId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.revision
    }
}
