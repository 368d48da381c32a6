//! Application Registry: consumer applications and their lifecycle status.
//!
//! Credential slots are kept by the credential manager, not here; the
//! registry only knows an application's identity, grants, tags and status.

use std::sync::Arc;

use chrono::Utc;

use devportal_applications::{
    Application, ApplicationEvent, ApplicationPatch, ApplicationStatus, NewApplication,
};
use devportal_core::{ApplicationId, DomainError, DomainResult, Page, PageRequest, UserId};

use crate::events::EventSink;
use crate::locks::KeyedLocks;
use crate::store::{DEFAULT_MAX_PAGE_LIMIT, InMemoryKeyedStore, KeyedStore, sorted_page};

/// Sort fields accepted by [`ApplicationRegistry::list`].
pub const APPLICATION_SORT_FIELDS: &[&str] = &["name", "created", "changed", "status"];

pub type InMemoryApplicationStore = InMemoryKeyedStore<ApplicationId, Application>;

#[derive(Debug)]
pub struct ApplicationRegistry<S = InMemoryApplicationStore>
where
    S: KeyedStore<ApplicationId, Application>,
{
    store: S,
    /// Serializes updates per application, so their events reach the index in commit order.
    locks: KeyedLocks<ApplicationId>,
    events: Arc<EventSink>,
    max_page_limit: u32,
}

impl ApplicationRegistry {
    pub fn in_memory(events: Arc<EventSink>) -> Self {
        Self::new(InMemoryKeyedStore::new("applications"), events)
    }
}

impl<S> ApplicationRegistry<S>
where
    S: KeyedStore<ApplicationId, Application>,
{
    pub fn new(store: S, events: Arc<EventSink>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new("application locks"),
            events,
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
        }
    }

    pub fn with_max_page_limit(mut self, max_page_limit: u32) -> Self {
        self.max_page_limit = max_page_limit;
        self
    }

    /// Register in `draft` status. No credentials are issued here.
    pub fn register(&self, spec: NewApplication, actor: UserId) -> DomainResult<Application> {
        let application = Application::register(ApplicationId::new(), spec, actor, Utc::now())?;
        self.store.insert_root(application.clone())?;

        tracing::info!(application_id = %application.id, name = %application.name, "application registered");
        self.events.emit(ApplicationEvent::Registered {
            application_id: application.id,
            name: application.name.clone(),
            tags: application.tags.clone(),
            actor,
            occurred_at: application.created,
        });
        Ok(application)
    }

    pub fn get(&self, application_id: ApplicationId) -> DomainResult<Application> {
        self.store
            .get(&application_id)?
            .ok_or_else(|| DomainError::not_found("application", application_id))
    }

    pub fn list(&self, request: &PageRequest) -> DomainResult<Page<Application>> {
        let applications = self.store.list()?;
        sorted_page(applications, request, self.max_page_limit, APPLICATION_SORT_FIELDS, |field, a, b| {
            let ordering = match field {
                "created" => a.created.cmp(&b.created),
                "changed" => a.changed.cmp(&b.changed),
                "status" => a.status.as_str().cmp(b.status.as_str()),
                _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        })
    }

    /// Change name, description, grant types or tags.
    ///
    /// Validated like [`register`](Self::register); a revoked application
    /// cannot be updated (`InvalidState`).
    pub fn update(
        &self,
        application_id: ApplicationId,
        patch: ApplicationPatch,
        actor: UserId,
    ) -> DomainResult<Application> {
        self.locks.with(&application_id, || {
            let application = self
                .store
                .update(&application_id, |application| {
                    application.apply_patch(patch, actor, Utc::now())?;
                    Ok(application.clone())
                })?
                .ok_or_else(|| DomainError::not_found("application", application_id))?;

            tracing::info!(application_id = %application_id, revision = application.revision, "application updated");
            self.events.emit(ApplicationEvent::Updated {
                application_id,
                name: application.name.clone(),
                tags: application.tags.clone(),
                actor,
                occurred_at: application.changed,
            });
            Ok(application)
        })
    }

    /// Apply a lifecycle transition; a transition to the current status is a no-op.
    pub fn set_status(
        &self,
        application_id: ApplicationId,
        status: ApplicationStatus,
        actor: UserId,
    ) -> DomainResult<Application> {
        let outcome = self
            .store
            .update(&application_id, |application| {
                let from = application.set_status(status, actor, Utc::now())?;
                Ok((from, application.clone()))
            })
            .inspect_err(|err| {
                if let DomainError::InvalidState(reason) = err {
                    tracing::warn!(application_id = %application_id, to = %status, "status change rejected: {reason}");
                }
            })?;
        let Some((from, application)) = outcome else {
            return Err(DomainError::not_found("application", application_id));
        };

        match from {
            Some(from) => {
                tracing::info!(application_id = %application_id, from = %from, to = %status, "application status changed");
                self.events.emit(ApplicationEvent::StatusChanged {
                    application_id,
                    from,
                    to: status,
                    actor,
                    occurred_at: application.changed,
                });
            }
            None => tracing::debug!(application_id = %application_id, status = %status, "status unchanged"),
        }
        Ok(application)
    }

    /// `draft -> active` after a first successful subscription.
    pub fn activate_if_draft(&self, application_id: ApplicationId, actor: UserId) -> DomainResult<bool> {
        let activated = self
            .store
            .update(&application_id, |application| {
                Ok(application
                    .activate_if_draft(actor, Utc::now())
                    .then_some(application.changed))
            })?
            .ok_or_else(|| DomainError::not_found("application", application_id))?;

        let Some(occurred_at) = activated else {
            return Ok(false);
        };
        tracing::info!(application_id = %application_id, "application activated by first subscription");
        self.events.emit(ApplicationEvent::StatusChanged {
            application_id,
            from: ApplicationStatus::Draft,
            to: ApplicationStatus::Active,
            actor,
            occurred_at,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use devportal_applications::GrantType;
    use devportal_events::Event;

    use super::*;

    fn registry() -> ApplicationRegistry {
        ApplicationRegistry::in_memory(Arc::new(EventSink::default()))
    }

    #[test]
    fn register_starts_in_draft() {
        let registry = registry();
        let app = registry.register(NewApplication::named("billing"), UserId::new()).unwrap();
        assert_eq!(app.status, ApplicationStatus::Draft);
        assert!(app.grant_types.contains(&GrantType::ClientCredentials));
        assert_eq!(registry.get(app.id).unwrap(), app);
    }

    #[test]
    fn register_requires_a_grant_type() {
        let registry = registry();
        let mut spec = NewApplication::named("billing");
        spec.grant_types.clear();
        let err = registry.register(spec, UserId::new()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn lifecycle_follows_the_transition_table() {
        let registry = registry();
        let actor = UserId::new();
        let app = registry.register(NewApplication::named("billing"), actor).unwrap();

        let err = registry.set_status(app.id, ApplicationStatus::Suspended, actor).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(registry.get(app.id).unwrap().status, ApplicationStatus::Draft);

        assert!(registry.activate_if_draft(app.id, actor).unwrap());
        assert!(!registry.activate_if_draft(app.id, actor).unwrap());

        registry.set_status(app.id, ApplicationStatus::Suspended, actor).unwrap();
        registry.set_status(app.id, ApplicationStatus::Active, actor).unwrap();
        let revoked = registry.set_status(app.id, ApplicationStatus::Revoked, actor).unwrap();
        assert_eq!(revoked.status, ApplicationStatus::Revoked);

        let err = registry.set_status(app.id, ApplicationStatus::Revoked, actor).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        let err = registry.set_status(app.id, ApplicationStatus::Active, actor).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn update_changes_fields_and_emits() {
        let sink = Arc::new(EventSink::default());
        let listener = sink.subscribe();
        let registry = ApplicationRegistry::in_memory(sink);
        let (owner, editor) = (UserId::new(), UserId::new());
        let app = registry.register(NewApplication::named("billing"), owner).unwrap();

        let patch = ApplicationPatch {
            description: Some("invoices and receipts".into()),
            tags: Some(vec!["Finance".into()]),
            ..ApplicationPatch::default()
        };
        let updated = registry.update(app.id, patch, editor).unwrap();
        assert_eq!(updated.description.as_deref(), Some("invoices and receipts"));
        assert!(updated.tags.contains("finance"));
        assert_eq!(updated.created_by, owner);
        assert_eq!(updated.changed_by, editor);
        assert_eq!(registry.get(app.id).unwrap(), updated);

        let events = listener.drain();
        assert!(matches!(
            events.last().map(|e| e.payload().event_type()),
            Some("applications.application.updated")
        ));
    }

    #[test]
    fn update_rejects_invalid_patches_and_revoked_applications() {
        let registry = registry();
        let actor = UserId::new();
        let app = registry.register(NewApplication::named("billing"), actor).unwrap();

        let blank = ApplicationPatch {
            name: Some("  ".into()),
            ..ApplicationPatch::default()
        };
        assert!(matches!(
            registry.update(app.id, blank, actor),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            registry.update(app.id, ApplicationPatch::default(), actor),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(registry.get(app.id).unwrap(), app);

        registry.set_status(app.id, ApplicationStatus::Revoked, actor).unwrap();
        let rename = ApplicationPatch {
            name: Some("billing-v2".into()),
            ..ApplicationPatch::default()
        };
        assert!(matches!(
            registry.update(app.id, rename.clone(), actor),
            Err(DomainError::InvalidState(_))
        ));
        assert!(matches!(
            registry.update(ApplicationId::new(), rename, actor),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test]
    fn unknown_application_is_not_found() {
        let registry = registry();
        let id = ApplicationId::new();
        assert!(matches!(registry.get(id), Err(DomainError::NotFound { .. })));
        assert!(matches!(
            registry.set_status(id, ApplicationStatus::Active, UserId::new()),
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            registry.activate_if_draft(id, UserId::new()),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test]
    fn list_sorts_by_name_case_insensitively() {
        let registry = registry();
        for name in ["beta", "Alpha", "gamma"] {
            registry.register(NewApplication::named(name), UserId::new()).unwrap();
        }
        let page = registry.list(&PageRequest::new(0, 10)).unwrap();
        let names: Vec<_> = page.items.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta", "gamma"]);
    }
}
