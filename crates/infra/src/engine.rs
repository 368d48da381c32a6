//! Entitlement Engine: subscriptions binding an application to a product in
//! one environment.
//!
//! ## Locking
//!
//! Mutations of one `(application, product, environment)` triple run under
//! that triple's lock, so the uniqueness check and the insert are atomic
//! with respect to concurrent callers. Inside it, the credential slot lock
//! of `(application, environment)` is taken around credential provisioning
//! and the subscription write, and around removal plus the "last
//! subscription of the slot" check on revocation. Locks are always taken in
//! that order: triple, then slot.
//!
//! The application's status is read again under the slot lock before a
//! credential is provisioned. Revoking an application commits its status
//! first and then sweeps every slot under the same locks, so a subscription
//! either completes before the sweep reaches its slot or fails the re-read.
//!
//! ## Subscribed vs. entitled
//!
//! A subscription stays recorded when its product is later deprecated or
//! disabled. [`EntitlementEngine::list_entitlements`] decides at read time
//! which subscriptions currently grant access.

use std::sync::Arc;

use chrono::Utc;

use devportal_catalog::Product;
use devportal_core::{
    ApplicationId, DomainError, DomainResult, EnvironmentId, Page, PageRequest, ProductId,
    SubscriptionId, UserId,
};
use devportal_entitlements::{EntitlementKey, Subscription, SubscriptionEvent};

use crate::catalog_store::CatalogStore;
use crate::credentials::CredentialManager;
use crate::environments::EnvironmentDirectory;
use crate::events::EventSink;
use crate::locks::KeyedLocks;
use crate::registry::ApplicationRegistry;
use crate::store::{DEFAULT_MAX_PAGE_LIMIT, SubscriptionFilter, SubscriptionStore, sorted_page};

/// Sort fields accepted by [`EntitlementEngine::list_subscriptions`].
pub const SUBSCRIPTION_SORT_FIELDS: &[&str] = &["created", "changed"];

#[derive(Debug)]
pub struct EntitlementEngine {
    catalog: Arc<CatalogStore>,
    registry: Arc<ApplicationRegistry>,
    environments: Arc<EnvironmentDirectory>,
    credentials: Arc<CredentialManager>,
    subscriptions: SubscriptionStore,
    locks: KeyedLocks<EntitlementKey>,
    events: Arc<EventSink>,
    max_page_limit: u32,
}

impl EntitlementEngine {
    pub fn new(
        catalog: Arc<CatalogStore>,
        registry: Arc<ApplicationRegistry>,
        environments: Arc<EnvironmentDirectory>,
        credentials: Arc<CredentialManager>,
        events: Arc<EventSink>,
    ) -> Self {
        Self {
            catalog,
            registry,
            environments,
            credentials,
            subscriptions: SubscriptionStore::new(),
            locks: KeyedLocks::new("entitlement locks"),
            events,
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
        }
    }

    pub fn with_max_page_limit(mut self, max_page_limit: u32) -> Self {
        self.max_page_limit = max_page_limit;
        self
    }

    /// Subscribe an application to a product in one environment.
    ///
    /// Checks run in a fixed order so that the reported error is
    /// deterministic when several conditions fail at once:
    ///
    /// 1. application, product and environment exist (`NotFound`)
    /// 2. product is enabled and not deprecated (`InvalidState`)
    /// 3. application is neither suspended nor revoked (`InvalidState`)
    /// 4. no subscription exists for the triple (`Conflict`)
    ///
    /// On success the slot's credential is provisioned (or reused), the
    /// subscription is committed, and a `draft` application becomes `active`.
    pub fn create_subscription(
        &self,
        application_id: ApplicationId,
        product_id: ProductId,
        environment_id: EnvironmentId,
        actor: UserId,
    ) -> DomainResult<Subscription> {
        let key = EntitlementKey::new(application_id, product_id, environment_id);

        self.locks.with(&key, || {
            let application = self.registry.get(application_id)?;
            let product = self.catalog.get_product(product_id)?;
            self.environments.get(environment_id)?;

            if !product.is_entitleable() {
                return Err(DomainError::invalid_state(format!(
                    "product {product_id} is {}",
                    if product.deprecated { "deprecated" } else { "disabled" }
                )));
            }
            application.ensure_can_subscribe()?;

            if let Some(existing) = self.subscriptions.find(&key)? {
                return Err(DomainError::conflict(format!(
                    "subscription {} already exists for {key}",
                    existing.id
                )));
            }

            let slot = key.slot();
            let subscription = self.credentials.with_slot(&slot, || {
                self.registry.get(application_id)?.ensure_can_subscribe()?;
                // A credential provisioned here survives a failed insert;
                // the next attempt reuses it.
                self.credentials.provision_unlocked(&slot)?;
                let subscription = Subscription::create(SubscriptionId::new(), key, actor, Utc::now());
                self.subscriptions.insert_unique(subscription.clone())?;
                Ok(subscription)
            })?;

            self.registry.activate_if_draft(application_id, actor)?;

            tracing::info!(
                subscription_id = %subscription.id,
                application_id = %application_id,
                product_id = %product_id,
                environment_id = %environment_id,
                "subscription created"
            );
            self.events.emit(SubscriptionEvent::Created {
                subscription_id: subscription.id,
                key,
                actor,
                occurred_at: subscription.created,
            });
            Ok(subscription)
        })
    }

    /// Hard-delete a subscription.
    ///
    /// The slot's credential is revoked only when this was the last
    /// subscription of the application in that environment.
    pub fn revoke_subscription(
        &self,
        subscription_id: SubscriptionId,
        actor: UserId,
    ) -> DomainResult<Subscription> {
        let key = self.get_subscription(subscription_id)?.key();

        self.locks.with(&key, || {
            let slot = key.slot();
            let (removed, remaining) = self.credentials.with_slot(&slot, || {
                let removed = self
                    .subscriptions
                    .remove(subscription_id)?
                    .ok_or_else(|| DomainError::not_found("subscription", subscription_id))?;
                let remaining = self.subscriptions.count_for_slot(&slot)?;
                if remaining == 0 {
                    self.credentials.revoke_unlocked(&slot)?;
                }
                Ok((removed, remaining))
            })?;

            tracing::info!(
                subscription_id = %subscription_id,
                application_id = %key.application_id,
                environment_id = %key.environment_id,
                remaining,
                "subscription revoked"
            );
            self.events.emit(SubscriptionEvent::Revoked {
                subscription_id,
                key,
                actor,
                occurred_at: Utc::now(),
            });
            Ok(removed)
        })
    }

    pub fn get_subscription(&self, subscription_id: SubscriptionId) -> DomainResult<Subscription> {
        self.subscriptions
            .get(subscription_id)?
            .ok_or_else(|| DomainError::not_found("subscription", subscription_id))
    }

    pub fn list_subscriptions(
        &self,
        filter: &SubscriptionFilter,
        request: &PageRequest,
    ) -> DomainResult<Page<Subscription>> {
        let subscriptions = self.subscriptions.list(filter)?;
        sorted_page(subscriptions, request, self.max_page_limit, SUBSCRIPTION_SORT_FIELDS, |field, a, b| {
            let ordering = match field {
                "changed" => a.changed.cmp(&b.changed),
                _ => a.created.cmp(&b.created),
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        })
    }

    /// Products the application is currently entitled to in one environment.
    ///
    /// Read-only and lazy: the subscribed product ids are captured up front,
    /// each product is looked up as the iterator advances, and products that
    /// are deprecated or disabled at that moment are skipped.
    pub fn list_entitlements(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
    ) -> DomainResult<Entitlements<'_>> {
        self.registry.get(application_id)?;
        self.environments.get(environment_id)?;

        let filter = SubscriptionFilter {
            application_id: Some(application_id),
            environment_id: Some(environment_id),
            ..SubscriptionFilter::default()
        };
        let mut subscriptions = self.subscriptions.list(&filter)?;
        subscriptions.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));

        Ok(Entitlements {
            catalog: &self.catalog,
            pending: subscriptions
                .into_iter()
                .map(|s| s.product_id)
                .collect::<Vec<_>>()
                .into_iter(),
        })
    }

    /// Whether a live entitlement exists for the triple right now.
    pub fn is_entitled(&self, key: &EntitlementKey) -> DomainResult<bool> {
        if self.subscriptions.find(key)?.is_none() {
            return Ok(false);
        }
        Ok(self
            .catalog
            .find_product(key.product_id)?
            .is_some_and(|p| p.is_entitleable()))
    }
}

/// Lazy sequence of currently entitled products, see
/// [`EntitlementEngine::list_entitlements`].
#[derive(Debug)]
pub struct Entitlements<'a> {
    catalog: &'a CatalogStore,
    pending: std::vec::IntoIter<ProductId>,
}

impl Iterator for Entitlements<'_> {
    type Item = DomainResult<Product>;

    fn next(&mut self) -> Option<Self::Item> {
        for product_id in self.pending.by_ref() {
            match self.catalog.find_product(product_id) {
                Ok(Some(product)) if product.is_entitleable() => return Some(Ok(product)),
                Ok(_) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.pending.len()))
    }
}
