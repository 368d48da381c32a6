//! Category/Tag Index: secondary lookups for listing and filtering.
//!
//! A projection over portal events, applied synchronously by the
//! [`EventSink`](crate::events::EventSink) after each commit. It stores ids
//! only; callers resolve them against the owning component.
//!
//! Replayed envelopes (sequence at or below the last applied one) are ignored.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use devportal_applications::ApplicationEvent;
use devportal_catalog::CatalogEvent;
use devportal_core::{
    ApplicationId, CategoryId, DomainResult, EndpointId, EnvironmentId, ProductId, SubscriptionId,
};
use devportal_entitlements::SubscriptionEvent;
use devportal_events::{EventEnvelope, Projection};
use serde::Serialize;

use crate::events::PortalEvent;
use crate::store::poisoned;

#[derive(Debug, Clone)]
struct CategoryEntry {
    name: String,
    weight: i32,
}

#[derive(Debug, Clone, Default)]
struct ProductEntry {
    name: String,
    weight: i32,
    categories: Vec<CategoryId>,
    tags: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct IndexState {
    last_sequence: u64,
    categories: HashMap<CategoryId, CategoryEntry>,
    products: HashMap<ProductId, ProductEntry>,
    products_by_category: HashMap<CategoryId, BTreeSet<ProductId>>,
    products_by_tag: HashMap<String, BTreeSet<ProductId>>,
    endpoints_by_tag: HashMap<String, BTreeSet<EndpointId>>,
    application_tags: HashMap<ApplicationId, BTreeSet<String>>,
    applications_by_tag: HashMap<String, BTreeSet<ApplicationId>>,
    subscriptions_by_environment: HashMap<EnvironmentId, BTreeSet<SubscriptionId>>,
}

impl IndexState {
    fn index_product(&mut self, product_id: ProductId, entry: ProductEntry) {
        if let Some(old) = self.products.remove(&product_id) {
            for category in &old.categories {
                remove_member(&mut self.products_by_category, category, &product_id);
            }
            for tag in &old.tags {
                remove_member(&mut self.products_by_tag, tag, &product_id);
            }
        }
        for category in &entry.categories {
            self.products_by_category
                .entry(*category)
                .or_default()
                .insert(product_id);
        }
        for tag in &entry.tags {
            self.products_by_tag
                .entry(tag.clone())
                .or_default()
                .insert(product_id);
        }
        self.products.insert(product_id, entry);
    }

    fn index_application(&mut self, application_id: ApplicationId, tags: &BTreeSet<String>) {
        if let Some(old) = self.application_tags.remove(&application_id) {
            for tag in &old {
                remove_member(&mut self.applications_by_tag, tag, &application_id);
            }
        }
        for tag in tags {
            self.applications_by_tag
                .entry(tag.clone())
                .or_default()
                .insert(application_id);
        }
        self.application_tags.insert(application_id, tags.clone());
    }

    fn apply(&mut self, event: &PortalEvent) {
        match event {
            PortalEvent::Catalog(CatalogEvent::ProductCreated {
                product_id,
                name,
                weight,
                categories,
                tags,
                ..
            })
            | PortalEvent::Catalog(CatalogEvent::ProductUpdated {
                product_id,
                name,
                weight,
                categories,
                tags,
                ..
            }) => self.index_product(
                *product_id,
                ProductEntry {
                    name: name.clone(),
                    weight: *weight,
                    categories: categories.clone(),
                    tags: tags.clone(),
                },
            ),
            PortalEvent::Catalog(CatalogEvent::EndpointAdded {
                endpoint_id, tags, ..
            }) => {
                for tag in tags {
                    self.endpoints_by_tag
                        .entry(tag.clone())
                        .or_default()
                        .insert(*endpoint_id);
                }
            }
            PortalEvent::Catalog(CatalogEvent::CategoryCreated {
                category_id,
                name,
                weight,
                ..
            }) => {
                self.categories.insert(
                    *category_id,
                    CategoryEntry {
                        name: name.clone(),
                        weight: *weight,
                    },
                );
            }
            PortalEvent::Application(ApplicationEvent::Registered {
                application_id,
                tags,
                ..
            })
            | PortalEvent::Application(ApplicationEvent::Updated {
                application_id,
                tags,
                ..
            }) => self.index_application(*application_id, tags),
            PortalEvent::Subscription(SubscriptionEvent::Created {
                subscription_id,
                key,
                ..
            }) => {
                self.subscriptions_by_environment
                    .entry(key.environment_id)
                    .or_default()
                    .insert(*subscription_id);
            }
            PortalEvent::Subscription(SubscriptionEvent::Revoked {
                subscription_id,
                key,
                ..
            }) => {
                remove_member(
                    &mut self.subscriptions_by_environment,
                    &key.environment_id,
                    subscription_id,
                );
            }
            _ => {}
        }
    }

    /// Product weight, then name (case-insensitive), then id.
    fn product_order(&self, a: &ProductId, b: &ProductId) -> Ordering {
        let (ea, eb) = (self.products.get(a), self.products.get(b));
        let weight = |e: Option<&ProductEntry>| e.map_or(0, |e| e.weight);
        let name = |e: Option<&ProductEntry>| e.map(|e| e.name.to_lowercase()).unwrap_or_default();
        weight(ea)
            .cmp(&weight(eb))
            .then_with(|| name(ea).cmp(&name(eb)))
            .then_with(|| a.cmp(b))
    }

    fn ordered_products(&self, ids: Option<&BTreeSet<ProductId>>) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = ids.into_iter().flatten().copied().collect();
        ids.sort_by(|a, b| self.product_order(a, b));
        ids
    }
}

fn remove_member<K, V>(index: &mut HashMap<K, BTreeSet<V>>, key: &K, member: &V)
where
    K: Eq + std::hash::Hash,
    V: Ord,
{
    if let Some(members) = index.get_mut(key) {
        members.remove(member);
        if members.is_empty() {
            index.remove(key);
        }
    }
}

/// Products of one category, in listing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryListing {
    pub category_id: CategoryId,
    pub products: Vec<ProductId>,
}

#[derive(Debug, Default)]
pub struct CatalogIndex {
    state: RwLock<IndexState>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sequence(&self) -> DomainResult<u64> {
        Ok(self.state.read().map_err(poisoned("index"))?.last_sequence)
    }

    /// Products in one category, by product weight then name.
    pub fn products_in_category(&self, category_id: CategoryId) -> DomainResult<Vec<ProductId>> {
        let state = self.state.read().map_err(poisoned("index"))?;
        Ok(state.ordered_products(state.products_by_category.get(&category_id)))
    }

    /// Every category with its products, categories by weight then name.
    pub fn by_category(&self) -> DomainResult<Vec<CategoryListing>> {
        let state = self.state.read().map_err(poisoned("index"))?;
        let mut categories: Vec<(&CategoryId, &CategoryEntry)> = state.categories.iter().collect();
        categories.sort_by(|(ia, a), (ib, b)| {
            a.weight
                .cmp(&b.weight)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| ia.cmp(ib))
        });
        Ok(categories
            .into_iter()
            .map(|(id, _)| CategoryListing {
                category_id: *id,
                products: state.ordered_products(state.products_by_category.get(id)),
            })
            .collect())
    }

    pub fn products_with_tag(&self, tag: &str) -> DomainResult<Vec<ProductId>> {
        let state = self.state.read().map_err(poisoned("index"))?;
        Ok(state.ordered_products(state.products_by_tag.get(tag)))
    }

    pub fn endpoints_with_tag(&self, tag: &str) -> DomainResult<Vec<EndpointId>> {
        let state = self.state.read().map_err(poisoned("index"))?;
        Ok(collect_ids(state.endpoints_by_tag.get(tag)))
    }

    pub fn applications_with_tag(&self, tag: &str) -> DomainResult<Vec<ApplicationId>> {
        let state = self.state.read().map_err(poisoned("index"))?;
        Ok(collect_ids(state.applications_by_tag.get(tag)))
    }

    pub fn subscriptions_in_environment(
        &self,
        environment_id: EnvironmentId,
    ) -> DomainResult<Vec<SubscriptionId>> {
        let state = self.state.read().map_err(poisoned("index"))?;
        Ok(collect_ids(state.subscriptions_by_environment.get(&environment_id)))
    }
}

fn collect_ids<T: Copy>(ids: Option<&BTreeSet<T>>) -> Vec<T> {
    ids.into_iter().flatten().copied().collect()
}

impl Projection for CatalogIndex {
    type Ev = PortalEvent;

    fn apply(&self, envelope: &EventEnvelope<PortalEvent>) {
        let Ok(mut state) = self.state.write() else {
            tracing::error!(sequence = envelope.sequence(), "index lock poisoned; event skipped");
            return;
        };
        if !envelope.follows(state.last_sequence) {
            tracing::debug!(sequence = envelope.sequence(), "index already applied event");
            return;
        }
        state.apply(envelope.payload());
        state.last_sequence = envelope.sequence();
    }
}
