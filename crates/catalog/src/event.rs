use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use devportal_core::{CategoryId, EndpointId, EnvironmentKind, ProductId, ProductVersion, TagId};
use devportal_events::Event;

/// Facts emitted by the catalog store after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogEvent {
    ProductCreated {
        product_id: ProductId,
        name: String,
        weight: i32,
        categories: Vec<CategoryId>,
        tags: BTreeSet<String>,
        occurred_at: DateTime<Utc>,
    },
    ProductUpdated {
        product_id: ProductId,
        version: ProductVersion,
        name: String,
        weight: i32,
        categories: Vec<CategoryId>,
        tags: BTreeSet<String>,
        occurred_at: DateTime<Utc>,
    },
    ProductEnabledChanged {
        product_id: ProductId,
        enabled: bool,
        version: ProductVersion,
        occurred_at: DateTime<Utc>,
    },
    ProductDeprecated {
        product_id: ProductId,
        version: ProductVersion,
        occurred_at: DateTime<Utc>,
    },
    EndpointAdded {
        endpoint_id: EndpointId,
        product_id: ProductId,
        tags: BTreeSet<String>,
        occurred_at: DateTime<Utc>,
    },
    EndpointScopeChanged {
        endpoint_id: EndpointId,
        product_id: ProductId,
        kind: EnvironmentKind,
        occurred_at: DateTime<Utc>,
    },
    EndpointDeprecated {
        endpoint_id: EndpointId,
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
    },
    CategoryCreated {
        category_id: CategoryId,
        name: String,
        weight: i32,
        parent: Option<CategoryId>,
        occurred_at: DateTime<Utc>,
    },
    ApiTagCreated {
        tag_id: TagId,
        name: String,
        occurred_at: DateTime<Utc>,
    },
    ProductTagCreated {
        tag_id: TagId,
        name: String,
        occurred_at: DateTime<Utc>,
    },
}

impl CatalogEvent {
    /// UUID of the entity the event is about.
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            CatalogEvent::ProductCreated { product_id, .. }
            | CatalogEvent::ProductUpdated { product_id, .. }
            | CatalogEvent::ProductEnabledChanged { product_id, .. }
            | CatalogEvent::ProductDeprecated { product_id, .. } => (*product_id).into(),
            CatalogEvent::EndpointAdded { endpoint_id, .. }
            | CatalogEvent::EndpointScopeChanged { endpoint_id, .. }
            | CatalogEvent::EndpointDeprecated { endpoint_id, .. } => (*endpoint_id).into(),
            CatalogEvent::CategoryCreated { category_id, .. } => (*category_id).into(),
            CatalogEvent::ApiTagCreated { tag_id, .. }
            | CatalogEvent::ProductTagCreated { tag_id, .. } => (*tag_id).into(),
        }
    }

    pub fn aggregate_type(&self) -> &'static str {
        match self {
            CatalogEvent::ProductCreated { .. }
            | CatalogEvent::ProductUpdated { .. }
            | CatalogEvent::ProductEnabledChanged { .. }
            | CatalogEvent::ProductDeprecated { .. } => "catalog.product",
            CatalogEvent::EndpointAdded { .. }
            | CatalogEvent::EndpointScopeChanged { .. }
            | CatalogEvent::EndpointDeprecated { .. } => "catalog.endpoint",
            CatalogEvent::CategoryCreated { .. } => "catalog.category",
            CatalogEvent::ApiTagCreated { .. } | CatalogEvent::ProductTagCreated { .. } => "catalog.tag",
        }
    }
}

impl Event for CatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::ProductCreated { .. } => "catalog.product.created",
            CatalogEvent::ProductUpdated { .. } => "catalog.product.updated",
            CatalogEvent::ProductEnabledChanged { .. } => "catalog.product.enabled_changed",
            CatalogEvent::ProductDeprecated { .. } => "catalog.product.deprecated",
            CatalogEvent::EndpointAdded { .. } => "catalog.endpoint.added",
            CatalogEvent::EndpointScopeChanged { .. } => "catalog.endpoint.scope_changed",
            CatalogEvent::EndpointDeprecated { .. } => "catalog.endpoint.deprecated",
            CatalogEvent::CategoryCreated { .. } => "catalog.category.created",
            CatalogEvent::ApiTagCreated { .. } => "catalog.api_tag.created",
            CatalogEvent::ProductTagCreated { .. } => "catalog.product_tag.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CatalogEvent::ProductCreated { occurred_at, .. }
            | CatalogEvent::ProductUpdated { occurred_at, .. }
            | CatalogEvent::ProductEnabledChanged { occurred_at, .. }
            | CatalogEvent::ProductDeprecated { occurred_at, .. }
            | CatalogEvent::EndpointAdded { occurred_at, .. }
            | CatalogEvent::EndpointScopeChanged { occurred_at, .. }
            | CatalogEvent::EndpointDeprecated { occurred_at, .. }
            | CatalogEvent::CategoryCreated { occurred_at, .. }
            | CatalogEvent::ApiTagCreated { occurred_at, .. }
            | CatalogEvent::ProductTagCreated { occurred_at, .. } => *occurred_at,
        }
    }
}
