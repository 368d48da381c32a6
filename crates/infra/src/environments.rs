//! Environment Directory: the named deployment environments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use devportal_core::{DomainError, DomainResult, Environment, EnvironmentId, UserId};

use crate::events::{EnvironmentEvent, EventSink};
use crate::store::poisoned;

#[derive(Debug, Default)]
struct Directory {
    by_id: HashMap<EnvironmentId, Environment>,
    by_name: HashMap<String, EnvironmentId>,
}

#[derive(Debug)]
pub struct EnvironmentDirectory {
    inner: RwLock<Directory>,
    events: Arc<EventSink>,
}

impl EnvironmentDirectory {
    pub fn new(events: Arc<EventSink>) -> Self {
        Self {
            inner: RwLock::new(Directory::default()),
            events,
        }
    }

    /// Create each named environment that does not exist yet.
    pub fn seed<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
        actor: UserId,
    ) -> DomainResult<Vec<Environment>> {
        let mut seeded = Vec::new();
        for name in names {
            match self.by_name(name)? {
                Some(existing) => seeded.push(existing),
                None => seeded.push(self.create(name, actor)?),
            }
        }
        Ok(seeded)
    }

    /// Empty or duplicate names are a `Validation` error.
    pub fn create(&self, name: &str, actor: UserId) -> DomainResult<Environment> {
        let environment = Environment::new(EnvironmentId::new(), name, actor, Utc::now())?;

        let mut dir = self.inner.write().map_err(poisoned("environments"))?;
        if dir.by_name.contains_key(&environment.name) {
            return Err(DomainError::validation(format!(
                "environment '{}' already exists",
                environment.name
            )));
        }
        dir.by_name.insert(environment.name.clone(), environment.id);
        dir.by_id.insert(environment.id, environment.clone());

        tracing::info!(environment_id = %environment.id, name = %environment.name, "environment created");
        self.events.emit(EnvironmentEvent::Created {
            environment_id: environment.id,
            name: environment.name.clone(),
            actor,
            occurred_at: environment.created,
        });
        Ok(environment)
    }

    pub fn get(&self, environment_id: EnvironmentId) -> DomainResult<Environment> {
        let dir = self.inner.read().map_err(poisoned("environments"))?;
        dir.by_id
            .get(&environment_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("environment", environment_id))
    }

    /// Case-insensitive lookup by name.
    pub fn by_name(&self, name: &str) -> DomainResult<Option<Environment>> {
        let name = Environment::normalize_name(name)?;
        let dir = self.inner.read().map_err(poisoned("environments"))?;
        Ok(dir
            .by_name
            .get(&name)
            .and_then(|id| dir.by_id.get(id))
            .cloned())
    }

    /// All environments, by name.
    pub fn list(&self) -> DomainResult<Vec<Environment>> {
        let dir = self.inner.read().map_err(poisoned("environments"))?;
        let mut environments: Vec<_> = dir.by_id.values().cloned().collect();
        environments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(environments)
    }
}

#[cfg(test)]
mod tests {
    use devportal_core::EnvironmentKind;

    use super::*;

    fn directory() -> EnvironmentDirectory {
        EnvironmentDirectory::new(Arc::new(EventSink::default()))
    }

    #[test]
    fn seed_is_idempotent() {
        let dir = directory();
        let first = dir.seed(["development", "production"], UserId::new()).unwrap();
        let again = dir.seed(["Production"], UserId::new()).unwrap();
        assert_eq!(first[1].id, again[0].id);
        assert_eq!(dir.list().unwrap().len(), 2);
        assert_eq!(first[1].kind(), EnvironmentKind::Production);
    }

    #[test]
    fn duplicate_or_empty_name_is_rejected() {
        let dir = directory();
        dir.create("staging", UserId::new()).unwrap();
        assert!(matches!(dir.create(" STAGING ", UserId::new()), Err(DomainError::Validation(_))));
        assert!(matches!(dir.create("", UserId::new()), Err(DomainError::Validation(_))));
    }

    #[test]
    fn lookups() {
        let dir = directory();
        let env = dir.create("development", UserId::new()).unwrap();
        assert_eq!(dir.get(env.id).unwrap(), env);
        assert_eq!(dir.by_name("Development").unwrap(), Some(env));
        assert_eq!(dir.by_name("production").unwrap(), None);
        assert!(matches!(dir.get(EnvironmentId::new()), Err(DomainError::NotFound { .. })));
    }
}
