//! Process-wide wiring of the portal components.
//!
//! [`Portal`] owns one instance of every component, shares the event sink
//! between them, and seeds the configured environments at start-up. It also
//! hosts the operations that span components: revoking an application's
//! credentials together with the application, credential calls checked
//! against the registry and the environment directory, and index-backed
//! listings resolved against the catalog.

use std::sync::Arc;

use uuid::Uuid;

use devportal_applications::{
    Application, ApplicationStatus, ClientId, CredentialHandle, IssuedCredential,
};
use devportal_catalog::{ApiEndpoint, Product};
use devportal_core::{
    ApplicationId, CategoryId, DomainError, DomainResult, EnvironmentId, Page, PageRequest,
    UserId,
};
use devportal_entitlements::{SlotKey, Subscription};
use devportal_events::Listener;

use crate::catalog_store::CatalogStore;
use crate::config::PortalConfig;
use crate::credentials::CredentialManager;
use crate::engine::EntitlementEngine;
use crate::environments::EnvironmentDirectory;
use crate::events::{EventSink, PortalEnvelope, SharedProjection};
use crate::index::CatalogIndex;
use crate::registry::ApplicationRegistry;

/// Actor recorded for changes the portal makes on its own (seeding).
pub const SYSTEM_ACTOR: UserId = UserId::from_uuid(Uuid::nil());

#[derive(Debug)]
pub struct Portal {
    config: PortalConfig,
    events: Arc<EventSink>,
    index: Arc<CatalogIndex>,
    catalog: Arc<CatalogStore>,
    registry: Arc<ApplicationRegistry>,
    environments: Arc<EnvironmentDirectory>,
    credentials: Arc<CredentialManager>,
    engine: EntitlementEngine,
}

impl Portal {
    /// Build every component, empty, and seed the configured environments.
    pub fn new(config: PortalConfig) -> DomainResult<Self> {
        config.validate()?;

        let index = Arc::new(CatalogIndex::new());
        let projection: SharedProjection = index.clone();
        let events = Arc::new(EventSink::new(vec![projection]));
        let max = config.max_page_limit;

        let catalog = Arc::new(CatalogStore::new(events.clone()).with_max_page_limit(max));
        let registry = Arc::new(ApplicationRegistry::in_memory(events.clone()).with_max_page_limit(max));
        let environments = Arc::new(EnvironmentDirectory::new(events.clone()));
        let credentials = Arc::new(CredentialManager::in_memory(
            config.client_secret_bytes,
            events.clone(),
        ));
        let engine = EntitlementEngine::new(
            catalog.clone(),
            registry.clone(),
            environments.clone(),
            credentials.clone(),
            events.clone(),
        )
        .with_max_page_limit(max);

        environments.seed(config.environments.iter().map(String::as_str), SYSTEM_ACTOR)?;
        tracing::info!(environments = ?config.environments, "portal initialised");

        Ok(Self {
            config,
            events,
            index,
            catalog,
            registry,
            environments,
            credentials,
            engine,
        })
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn registry(&self) -> &ApplicationRegistry {
        &self.registry
    }

    pub fn environments(&self) -> &EnvironmentDirectory {
        &self.environments
    }

    pub fn engine(&self) -> &EntitlementEngine {
        &self.engine
    }

    pub fn index(&self) -> &CatalogIndex {
        &self.index
    }

    /// Listener for every event emitted from now on.
    pub fn subscribe(&self) -> Listener<PortalEnvelope> {
        self.events.subscribe()
    }

    /// Status change; moving to `revoked` also revokes every credential slot.
    ///
    /// The status is committed before the sweep, and every slot mutation
    /// re-reads it under the slot lock, so no credential outlives the
    /// revocation.
    pub fn set_application_status(
        &self,
        application_id: ApplicationId,
        status: ApplicationStatus,
        actor: UserId,
    ) -> DomainResult<Application> {
        let application = self.registry.set_status(application_id, status, actor)?;
        if application.status == ApplicationStatus::Revoked {
            let known = self.environments.list()?.into_iter().map(|e| e.id);
            let environments = self.credentials.revoke_all(application_id, known)?;
            tracing::info!(
                application_id = %application_id,
                slots = environments.len(),
                "credentials revoked with application"
            );
        }
        Ok(application)
    }

    pub fn revoke_application(&self, application_id: ApplicationId, actor: UserId) -> DomainResult<Application> {
        self.set_application_status(application_id, ApplicationStatus::Revoked, actor)
    }

    // ---- credentials ----

    /// Provision for an existing, non-revoked application in a known environment.
    pub fn provision_credential(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
    ) -> DomainResult<IssuedCredential> {
        let slot = SlotKey::new(application_id, environment_id);
        self.credentials.with_slot(&slot, || {
            self.ensure_live_slot(application_id, environment_id)?;
            self.credentials.provision_unlocked(&slot)
        })
    }

    pub fn rotate_credential(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
    ) -> DomainResult<IssuedCredential> {
        let slot = SlotKey::new(application_id, environment_id);
        self.credentials.with_slot(&slot, || {
            self.ensure_live_slot(application_id, environment_id)?;
            self.credentials.rotate_unlocked(&slot)
        })
    }

    pub fn revoke_credential(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
    ) -> DomainResult<Option<ClientId>> {
        self.ensure_slot(application_id, environment_id)?;
        self.credentials.revoke(application_id, environment_id)
    }

    pub fn verify_credential(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
        client_id: &str,
        secret: &str,
    ) -> DomainResult<bool> {
        self.ensure_slot(application_id, environment_id)?;
        self.credentials
            .verify(application_id, environment_id, client_id, secret)
    }

    pub fn current_credential(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
    ) -> DomainResult<Option<CredentialHandle>> {
        self.ensure_slot(application_id, environment_id)?;
        self.credentials.current(application_id, environment_id)
    }

    fn ensure_slot(&self, application_id: ApplicationId, environment_id: EnvironmentId) -> DomainResult<Application> {
        let application = self.registry.get(application_id)?;
        self.environments.get(environment_id)?;
        Ok(application)
    }

    fn ensure_live_slot(&self, application_id: ApplicationId, environment_id: EnvironmentId) -> DomainResult<()> {
        let application = self.ensure_slot(application_id, environment_id)?;
        if application.status == ApplicationStatus::Revoked {
            return Err(DomainError::invalid_state(format!(
                "application {application_id} is revoked"
            )));
        }
        Ok(())
    }

    // ---- index-backed listings ----

    pub fn products_in_category(
        &self,
        category_id: CategoryId,
        request: &PageRequest,
    ) -> DomainResult<Page<Product>> {
        self.catalog.get_category(category_id)?;
        let ids = self.index.products_in_category(category_id)?;
        self.resolve_page(ids, request, |id| self.catalog.find_product(id))
    }

    pub fn products_with_tag(&self, tag: &str, request: &PageRequest) -> DomainResult<Page<Product>> {
        let tag = CatalogStore::tag_key(tag)?;
        let ids = self.index.products_with_tag(&tag)?;
        self.resolve_page(ids, request, |id| self.catalog.find_product(id))
    }

    pub fn endpoints_with_tag(&self, tag: &str, request: &PageRequest) -> DomainResult<Page<ApiEndpoint>> {
        let tag = CatalogStore::tag_key(tag)?;
        let ids = self.index.endpoints_with_tag(&tag)?;
        self.resolve_page(ids, request, |id| {
            Ok(self.catalog.endpoints(&[id])?.into_iter().next())
        })
    }

    pub fn applications_with_tag(&self, tag: &str, request: &PageRequest) -> DomainResult<Page<Application>> {
        let tag = CatalogStore::tag_key(tag)?;
        let ids = self.index.applications_with_tag(&tag)?;
        self.resolve_page(ids, request, |id| match self.registry.get(id) {
            Ok(application) => Ok(Some(application)),
            Err(DomainError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        })
    }

    pub fn subscriptions_in_environment(
        &self,
        environment_id: EnvironmentId,
        request: &PageRequest,
    ) -> DomainResult<Page<Subscription>> {
        self.environments.get(environment_id)?;
        let ids = self.index.subscriptions_in_environment(environment_id)?;
        self.resolve_page(ids, request, |id| match self.engine.get_subscription(id) {
            Ok(subscription) => Ok(Some(subscription)),
            Err(DomainError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        })
    }

    /// Page over index ids in index order, resolving only the ids on the page.
    fn resolve_page<I: Copy, T>(
        &self,
        ids: Vec<I>,
        request: &PageRequest,
        resolve: impl Fn(I) -> DomainResult<Option<T>>,
    ) -> DomainResult<Page<T>> {
        request.validate(self.config.max_page_limit)?;
        if request.sort_field.as_deref().is_some_and(|f| !f.is_empty()) {
            return Err(DomainError::validation(
                "index listings have a fixed order and accept no sort field",
            ));
        }
        let page = request.paginate(ids);
        let mut items = Vec::with_capacity(page.items.len());
        for id in page.items {
            if let Some(item) = resolve(id)? {
                items.push(item);
            }
        }
        Ok(Page {
            items,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use devportal_applications::NewApplication;
    use devportal_catalog::{NewCategory, NewEndpoint, NewProduct};
    use devportal_core::EnvironmentKind;
    use devportal_events::Event;

    use super::*;

    fn portal() -> Portal {
        Portal::new(PortalConfig::default()).unwrap()
    }

    fn env(portal: &Portal, name: &str) -> EnvironmentId {
        portal.environments().by_name(name).unwrap().unwrap().id
    }

    #[test]
    fn seeds_configured_environments() {
        let portal = portal();
        let names: Vec<_> = portal
            .environments()
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["development", "production"]);
        let prod = portal.environments().by_name("production").unwrap().unwrap();
        assert_eq!(prod.kind(), EnvironmentKind::Production);
        assert_eq!(prod.created_by, SYSTEM_ACTOR);
    }

    #[test]
    fn revoking_an_application_revokes_its_credentials() {
        let portal = portal();
        let actor = UserId::new();
        let product = portal.catalog().create_product(NewProduct::named("Payments"), actor).unwrap();
        let app = portal.registry().register(NewApplication::named("Shop"), actor).unwrap();
        let (dev, prod) = (env(&portal, "development"), env(&portal, "production"));

        portal.engine().create_subscription(app.id, product.id, dev, actor).unwrap();
        portal.engine().create_subscription(app.id, product.id, prod, actor).unwrap();
        assert!(portal.current_credential(app.id, prod).unwrap().is_some());

        portal.revoke_application(app.id, actor).unwrap();
        assert!(portal.current_credential(app.id, dev).unwrap().is_none());
        assert!(portal.current_credential(app.id, prod).unwrap().is_none());

        let err = portal.provision_credential(app.id, prod).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        let err = portal
            .engine()
            .create_subscription(app.id, product.id, prod, actor)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn credential_calls_check_application_and_environment() {
        let portal = portal();
        let app = portal.registry().register(NewApplication::named("Shop"), UserId::new()).unwrap();
        assert!(matches!(
            portal.provision_credential(ApplicationId::new(), env(&portal, "production")),
            Err(DomainError::NotFound { entity: "application", .. })
        ));
        assert!(matches!(
            portal.provision_credential(app.id, EnvironmentId::new()),
            Err(DomainError::NotFound { entity: "environment", .. })
        ));

        let issued = portal.provision_credential(app.id, env(&portal, "production")).unwrap();
        let secret = issued.client_secret.unwrap();
        assert!(
            portal
                .verify_credential(app.id, env(&portal, "production"), issued.handle.client_id.as_str(), &secret)
                .unwrap()
        );
    }

    #[test]
    fn index_listings_follow_catalog_changes() {
        let portal = portal();
        let actor = UserId::new();
        let category = portal
            .catalog()
            .create_category(NewCategory {
                name: "Finance".into(),
                ..NewCategory::default()
            })
            .unwrap();

        let mut spec = NewProduct::named("Payments");
        spec.categories = vec![category.id];
        spec.tags = vec!["Fintech".into()];
        let product = portal.catalog().create_product(spec, actor).unwrap();

        let mut endpoint = NewEndpoint::new("charge", "payments", "charges");
        endpoint.tags = vec!["REST".into()];
        let endpoint = portal.catalog().add_endpoint(product.id, endpoint, actor).unwrap();

        let mut app = NewApplication::named("Shop");
        app.tags = vec!["partner".into()];
        let app = portal.registry().register(app, actor).unwrap();
        let prod = env(&portal, "production");
        let subscription = portal.engine().create_subscription(app.id, product.id, prod, actor).unwrap();

        let page = PageRequest::default();
        let in_category = portal.products_in_category(category.id, &page).unwrap();
        assert_eq!(in_category.items[0].id, product.id);
        assert_eq!(portal.products_with_tag("fintech", &page).unwrap().total, 1);
        assert_eq!(portal.endpoints_with_tag("rest", &page).unwrap().items[0].id, endpoint.id);
        assert_eq!(portal.applications_with_tag("Partner", &page).unwrap().items[0].id, app.id);
        assert_eq!(
            portal.subscriptions_in_environment(prod, &page).unwrap().items[0].id,
            subscription.id
        );

        portal.engine().revoke_subscription(subscription.id, actor).unwrap();
        assert_eq!(portal.subscriptions_in_environment(prod, &page).unwrap().total, 0);

        assert!(matches!(
            portal.products_in_category(CategoryId::new(), &page),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test]
    fn listeners_receive_envelopes_in_sequence() {
        let portal = portal();
        let listener = portal.subscribe();
        let actor = UserId::new();
        let product = portal.catalog().create_product(NewProduct::named("Payments"), actor).unwrap();
        portal.catalog().deprecate_product(product.id, actor).unwrap();

        let received = listener.drain();
        let types: Vec<_> = received.iter().map(|e| e.payload().event_type()).collect();
        assert_eq!(types, vec!["catalog.product.created", "catalog.product.deprecated"]);
        assert!(received[0].sequence() < received[1].sequence());
        assert_eq!(portal.index().last_sequence().unwrap(), received[1].sequence());
    }
}
