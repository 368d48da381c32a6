//! Catalog Store: products, their endpoints, and the category/tag definitions.
//!
//! All catalog state sits behind one `RwLock`. Writes are short and the
//! cross-entity rules (live product names, resource-path collisions, owning
//! product version bumps) need a consistent view of several maps at once.
//!
//! Events are emitted while the write lock is still held, so projections see
//! catalog changes in commit order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use devportal_catalog::{
    ApiEndpoint, ApiTag, CatalogEvent, NewCategory, NewEndpoint, NewProduct, Product,
    ProductCategory, ProductPatch, ProductTag, normalize_tag,
};
use devportal_core::{
    CategoryId, DomainError, DomainResult, EndpointId, EnvironmentKind, Page, PageRequest,
    ProductId, TagId, UserId,
};

use crate::events::EventSink;
use crate::store::{DEFAULT_MAX_PAGE_LIMIT, poisoned, sorted_page};

/// Sort fields accepted by [`CatalogStore::list_products`].
pub const PRODUCT_SORT_FIELDS: &[&str] = &["name", "weight", "created", "changed", "version"];

/// Sort fields accepted by [`CatalogStore::list_endpoints`].
pub const ENDPOINT_SORT_FIELDS: &[&str] = &["name", "context", "updated"];

type PathKey = (String, String);

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    endpoints: HashMap<EndpointId, ApiEndpoint>,
    /// Lower-cased names of non-deprecated products.
    live_names: HashMap<String, ProductId>,
    /// Every endpoint ever added, by (context, resource).
    paths: HashMap<PathKey, Vec<EndpointId>>,
    categories: HashMap<CategoryId, ProductCategory>,
    api_tags: HashMap<String, ApiTag>,
    product_tags: HashMap<String, ProductTag>,
}

impl CatalogState {
    fn product(&self, id: ProductId) -> DomainResult<&Product> {
        self.products
            .get(&id)
            .ok_or_else(|| DomainError::not_found("product", id))
    }

    fn endpoint(&self, id: EndpointId) -> DomainResult<&ApiEndpoint> {
        self.endpoints
            .get(&id)
            .ok_or_else(|| DomainError::not_found("endpoint", id))
    }

    fn ensure_name_free(&self, name: &str, owner: Option<ProductId>) -> DomainResult<()> {
        match self.live_names.get(&name.to_lowercase()) {
            Some(existing) if Some(*existing) != owner => Err(DomainError::validation(format!(
                "product name '{name}' is already used by product {existing}"
            ))),
            _ => Ok(()),
        }
    }

    fn ensure_categories_exist(&self, categories: &[CategoryId]) -> DomainResult<()> {
        match categories.iter().find(|c| !self.categories.contains_key(*c)) {
            Some(missing) => Err(DomainError::not_found("category", missing)),
            None => Ok(()),
        }
    }

    /// An endpoint at the same path under a different, non-deprecated product.
    fn path_owner(&self, path: &PathKey, product_id: ProductId) -> Option<ProductId> {
        self.paths
            .get(path)
            .into_iter()
            .flatten()
            .filter_map(|id| self.endpoints.get(id))
            .map(|e| e.product_id)
            .find(|owner| {
                *owner != product_id
                    && self.products.get(owner).is_some_and(|p| !p.deprecated)
            })
    }
}

#[derive(Debug)]
pub struct CatalogStore {
    state: RwLock<CatalogState>,
    events: Arc<EventSink>,
    max_page_limit: u32,
}

impl CatalogStore {
    pub fn new(events: Arc<EventSink>) -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            events,
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
        }
    }

    pub fn with_max_page_limit(mut self, max_page_limit: u32) -> Self {
        self.max_page_limit = max_page_limit;
        self
    }

    // ---- products ----

    pub fn create_product(&self, spec: NewProduct, actor: UserId) -> DomainResult<Product> {
        let mut state = self.state.write().map_err(poisoned("catalog"))?;

        let product = Product::create(ProductId::new(), spec, actor, Utc::now())?;
        state.ensure_name_free(&product.name, None)?;
        state.ensure_categories_exist(&product.categories)?;

        state.live_names.insert(product.name_key(), product.id);
        state.products.insert(product.id, product.clone());

        tracing::info!(product_id = %product.id, name = %product.name, "product created");
        self.events.emit(CatalogEvent::ProductCreated {
            product_id: product.id,
            name: product.name.clone(),
            weight: product.weight,
            categories: product.categories.clone(),
            tags: product.tags.clone(),
            occurred_at: product.changed,
        });
        Ok(product)
    }

    pub fn update_product(
        &self,
        product_id: ProductId,
        patch: ProductPatch,
        actor: UserId,
    ) -> DomainResult<Product> {
        let mut state = self.state.write().map_err(poisoned("catalog"))?;

        let mut updated = state.product(product_id)?.clone();
        let old_key = updated.name_key();
        updated.apply_patch(patch, actor, Utc::now())?;

        if !updated.deprecated {
            state.ensure_name_free(&updated.name, Some(product_id))?;
        }
        state.ensure_categories_exist(&updated.categories)?;

        if !updated.deprecated && updated.name_key() != old_key {
            state.live_names.remove(&old_key);
            state.live_names.insert(updated.name_key(), product_id);
        }
        state.products.insert(product_id, updated.clone());

        tracing::info!(product_id = %product_id, version = %updated.version, "product updated");
        self.events.emit(CatalogEvent::ProductUpdated {
            product_id,
            version: updated.version,
            name: updated.name.clone(),
            weight: updated.weight,
            categories: updated.categories.clone(),
            tags: updated.tags.clone(),
            occurred_at: updated.changed,
        });
        Ok(updated)
    }

    pub fn set_product_enabled(
        &self,
        product_id: ProductId,
        enabled: bool,
        actor: UserId,
    ) -> DomainResult<Product> {
        let mut state = self.state.write().map_err(poisoned("catalog"))?;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::not_found("product", product_id))?;

        if !product.set_enabled(enabled, actor, Utc::now())? {
            tracing::debug!(product_id = %product_id, enabled, "product enabled flag unchanged");
            return Ok(product.clone());
        }

        let product = product.clone();
        tracing::info!(product_id = %product_id, enabled, "product enabled flag changed");
        self.events.emit(CatalogEvent::ProductEnabledChanged {
            product_id,
            enabled,
            version: product.version,
            occurred_at: product.changed,
        });
        Ok(product)
    }

    /// Idempotent: deprecating a deprecated product changes nothing.
    pub fn deprecate_product(&self, product_id: ProductId, actor: UserId) -> DomainResult<Product> {
        let mut state = self.state.write().map_err(poisoned("catalog"))?;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::not_found("product", product_id))?;

        if !product.deprecate(actor, Utc::now())? {
            tracing::debug!(product_id = %product_id, "product already deprecated");
            return Ok(product.clone());
        }

        let product = product.clone();
        // The name becomes available to new live products.
        if state.live_names.get(&product.name_key()) == Some(&product_id) {
            state.live_names.remove(&product.name_key());
        }

        tracing::info!(product_id = %product_id, version = %product.version, "product deprecated");
        self.events.emit(CatalogEvent::ProductDeprecated {
            product_id,
            version: product.version,
            occurred_at: product.changed,
        });
        Ok(product)
    }

    pub fn get_product(&self, product_id: ProductId) -> DomainResult<Product> {
        let state = self.state.read().map_err(poisoned("catalog"))?;
        state.product(product_id).cloned()
    }

    /// `None` for an unknown product; used by read paths that skip missing ids.
    pub fn find_product(&self, product_id: ProductId) -> DomainResult<Option<Product>> {
        let state = self.state.read().map_err(poisoned("catalog"))?;
        Ok(state.products.get(&product_id).cloned())
    }

    pub fn list_products(&self, request: &PageRequest) -> DomainResult<Page<Product>> {
        let products: Vec<Product> = {
            let state = self.state.read().map_err(poisoned("catalog"))?;
            state.products.values().cloned().collect()
        };
        sorted_page(products, request, self.max_page_limit, PRODUCT_SORT_FIELDS, |field, a, b| {
            let ordering = match field {
                "weight" => a.weight.cmp(&b.weight),
                "created" => a.created.cmp(&b.created),
                "changed" => a.changed.cmp(&b.changed),
                "version" => a.version.cmp(&b.version),
                _ => a.name_key().cmp(&b.name_key()),
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        })
    }

    // ---- endpoints ----

    pub fn add_endpoint(
        &self,
        product_id: ProductId,
        spec: NewEndpoint,
        actor: UserId,
    ) -> DomainResult<ApiEndpoint> {
        let mut state = self.state.write().map_err(poisoned("catalog"))?;
        state.product(product_id)?;

        let now = Utc::now();
        let endpoint = ApiEndpoint::create(EndpointId::new(), product_id, spec, now)?;
        let path = endpoint.api.path_key();
        if let Some(owner) = state.path_owner(&path, product_id) {
            return Err(DomainError::conflict(format!(
                "api path {}/{} is already served by product {owner}",
                path.0, path.1
            )));
        }

        state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::not_found("product", product_id))?
            .attach_endpoint(endpoint.id, actor, now)?;
        state.paths.entry(path).or_default().push(endpoint.id);
        state.endpoints.insert(endpoint.id, endpoint.clone());

        tracing::info!(
            endpoint_id = %endpoint.id,
            product_id = %product_id,
            context = %endpoint.api.context,
            resource = %endpoint.api.resource,
            "endpoint added"
        );
        self.events.emit(CatalogEvent::EndpointAdded {
            endpoint_id: endpoint.id,
            product_id,
            tags: endpoint.tags.clone(),
            occurred_at: now,
        });
        Ok(endpoint)
    }

    pub fn get_endpoint(&self, endpoint_id: EndpointId) -> DomainResult<ApiEndpoint> {
        let state = self.state.read().map_err(poisoned("catalog"))?;
        state.endpoint(endpoint_id).cloned()
    }

    pub fn list_endpoints(
        &self,
        product_id: ProductId,
        request: &PageRequest,
    ) -> DomainResult<Page<ApiEndpoint>> {
        let endpoints: Vec<ApiEndpoint> = {
            let state = self.state.read().map_err(poisoned("catalog"))?;
            state
                .product(product_id)?
                .endpoints
                .iter()
                .filter_map(|id| state.endpoints.get(id))
                .cloned()
                .collect()
        };
        sorted_page(endpoints, request, self.max_page_limit, ENDPOINT_SORT_FIELDS, |field, a, b| {
            let ordering = match field {
                "context" => a.api.path_key().cmp(&b.api.path_key()),
                "updated" => a.updated.cmp(&b.updated),
                _ => a.name.cmp(&b.name),
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        })
    }

    /// Endpoints looked up by id; unknown ids are skipped.
    pub fn endpoints(&self, ids: &[EndpointId]) -> DomainResult<Vec<ApiEndpoint>> {
        let state = self.state.read().map_err(poisoned("catalog"))?;
        Ok(ids.iter().filter_map(|id| state.endpoints.get(id)).cloned().collect())
    }

    /// Idempotent. Also bumps the owning product's version when something changed.
    pub fn deprecate_endpoint(&self, endpoint_id: EndpointId, actor: UserId) -> DomainResult<ApiEndpoint> {
        self.modify_endpoint(endpoint_id, actor, |endpoint, now| {
            Ok(endpoint.deprecate(now)?.then(|| CatalogEvent::EndpointDeprecated {
                endpoint_id,
                product_id: endpoint.product_id,
                occurred_at: now,
            }))
        })
    }

    /// Replace one of the two scope strings; the other is left untouched.
    pub fn set_endpoint_scope(
        &self,
        endpoint_id: EndpointId,
        kind: EnvironmentKind,
        scope: Option<String>,
        actor: UserId,
    ) -> DomainResult<ApiEndpoint> {
        self.modify_endpoint(endpoint_id, actor, |endpoint, now| {
            if endpoint.scope_for(kind) == scope.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                return Ok(None);
            }
            endpoint.set_scope(kind, scope, now)?;
            Ok(Some(CatalogEvent::EndpointScopeChanged {
                endpoint_id,
                product_id: endpoint.product_id,
                kind,
                occurred_at: now,
            }))
        })
    }

    /// Apply `f` to one endpoint. When `f` yields an event the owning product
    /// is bumped and the event emitted; `None` means nothing changed.
    fn modify_endpoint(
        &self,
        endpoint_id: EndpointId,
        actor: UserId,
        f: impl FnOnce(&mut ApiEndpoint, DateTime<Utc>) -> DomainResult<Option<CatalogEvent>>,
    ) -> DomainResult<ApiEndpoint> {
        let mut state = self.state.write().map_err(poisoned("catalog"))?;
        let now = Utc::now();

        let mut endpoint = state.endpoint(endpoint_id)?.clone();
        let Some(event) = f(&mut endpoint, now)? else {
            tracing::debug!(endpoint_id = %endpoint_id, "endpoint unchanged");
            return Ok(endpoint);
        };

        // Nothing is stored until both versions have moved.
        if let Some(product) = state.products.get_mut(&endpoint.product_id) {
            product.endpoint_changed(actor, now)?;
        }
        state.endpoints.insert(endpoint_id, endpoint.clone());

        tracing::info!(endpoint_id = %endpoint_id, product_id = %endpoint.product_id, "endpoint changed");
        self.events.emit(event);
        Ok(endpoint)
    }

    // ---- categories and tags ----

    pub fn create_category(&self, spec: NewCategory) -> DomainResult<ProductCategory> {
        let mut state = self.state.write().map_err(poisoned("catalog"))?;
        if let Some(parent) = spec.parent {
            if !state.categories.contains_key(&parent) {
                return Err(DomainError::not_found("category", parent));
            }
        }

        let category = ProductCategory::create(CategoryId::new(), spec)?;
        state.categories.insert(category.id, category.clone());

        tracing::info!(category_id = %category.id, name = %category.name, "category created");
        self.events.emit(CatalogEvent::CategoryCreated {
            category_id: category.id,
            name: category.name.clone(),
            weight: category.weight,
            parent: category.parent,
            occurred_at: Utc::now(),
        });
        Ok(category)
    }

    pub fn get_category(&self, category_id: CategoryId) -> DomainResult<ProductCategory> {
        let state = self.state.read().map_err(poisoned("catalog"))?;
        state
            .categories
            .get(&category_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("category", category_id))
    }

    /// All categories, by weight then name.
    pub fn list_categories(&self) -> DomainResult<Vec<ProductCategory>> {
        let state = self.state.read().map_err(poisoned("catalog"))?;
        let mut categories: Vec<_> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.weight.cmp(&b.weight).then_with(|| a.name.cmp(&b.name)));
        Ok(categories)
    }

    pub fn create_api_tag(&self, name: &str) -> DomainResult<ApiTag> {
        let mut state = self.state.write().map_err(poisoned("catalog"))?;
        let tag = ApiTag::create(TagId::new(), name)?;
        if state.api_tags.contains_key(&tag.name) {
            return Err(DomainError::conflict(format!("api tag '{}' already exists", tag.name)));
        }
        state.api_tags.insert(tag.name.clone(), tag.clone());

        tracing::info!(tag = %tag.name, "api tag created");
        self.events.emit(CatalogEvent::ApiTagCreated {
            tag_id: tag.id,
            name: tag.name.clone(),
            occurred_at: Utc::now(),
        });
        Ok(tag)
    }

    pub fn list_api_tags(&self) -> DomainResult<Vec<ApiTag>> {
        let state = self.state.read().map_err(poisoned("catalog"))?;
        let mut tags: Vec<_> = state.api_tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    pub fn create_product_tag(&self, name: &str) -> DomainResult<ProductTag> {
        let mut state = self.state.write().map_err(poisoned("catalog"))?;
        let tag = ProductTag::create(TagId::new(), name)?;
        if state.product_tags.contains_key(&tag.name) {
            return Err(DomainError::conflict(format!(
                "product tag '{}' already exists",
                tag.name
            )));
        }
        state.product_tags.insert(tag.name.clone(), tag.clone());

        tracing::info!(tag = %tag.name, "product tag created");
        self.events.emit(CatalogEvent::ProductTagCreated {
            tag_id: tag.id,
            name: tag.name.clone(),
            occurred_at: Utc::now(),
        });
        Ok(tag)
    }

    pub fn list_product_tags(&self) -> DomainResult<Vec<ProductTag>> {
        let state = self.state.read().map_err(poisoned("catalog"))?;
        let mut tags: Vec<_> = state.product_tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    /// Normalized form of a tag, as stored on products and endpoints.
    pub fn tag_key(tag: &str) -> DomainResult<String> {
        normalize_tag(tag).ok_or_else(|| DomainError::validation("tag cannot be empty"))
    }
}
