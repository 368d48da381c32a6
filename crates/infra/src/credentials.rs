//! Credential Lifecycle Manager: per-(application, environment) client credentials.
//!
//! Each slot holds at most one active pair. Mutations of a slot run under
//! that slot's lock, so concurrent first subscribers converge on one issued
//! pair. Secrets leave this module in plaintext exactly once, in the
//! [`IssuedCredential`] returned by an issue or rotation; only their SHA-256
//! digest is stored.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use devportal_applications::{
    ApplicationEvent, ClientId, CredentialHandle, CredentialSlot, IssuedCredential, SecretDigest,
};
use devportal_core::{ApplicationId, DomainError, DomainResult, EnvironmentId};
use devportal_entitlements::SlotKey;

use crate::events::EventSink;
use crate::locks::KeyedLocks;
use crate::secrets::{CredentialGenerator, OsRngGenerator};
use crate::store::{InMemoryKeyedStore, KeyedStore, poisoned};

pub type InMemorySlotStore = InMemoryKeyedStore<SlotKey, CredentialSlot>;

/// Attempts at drawing an unused client identifier before giving up.
const MAX_CLIENT_ID_ATTEMPTS: usize = 8;

#[derive(Debug)]
pub struct CredentialManager<S = InMemorySlotStore, G = OsRngGenerator>
where
    S: KeyedStore<SlotKey, CredentialSlot>,
    G: CredentialGenerator,
{
    slots: S,
    locks: KeyedLocks<SlotKey>,
    /// Every client identifier ever handed out.
    issued: Mutex<HashSet<String>>,
    generator: G,
    events: Arc<EventSink>,
}

impl CredentialManager {
    pub fn in_memory(secret_bytes: usize, events: Arc<EventSink>) -> Self {
        Self::new(
            InMemoryKeyedStore::new("credential slots"),
            OsRngGenerator::new(secret_bytes),
            events,
        )
    }
}

impl<S, G> CredentialManager<S, G>
where
    S: KeyedStore<SlotKey, CredentialSlot>,
    G: CredentialGenerator,
{
    pub fn new(slots: S, generator: G, events: Arc<EventSink>) -> Self {
        Self {
            slots,
            locks: KeyedLocks::new("credential slot locks"),
            issued: Mutex::new(HashSet::new()),
            generator,
            events,
        }
    }

    /// Return the active pair, issuing one if the slot is empty.
    ///
    /// Idempotent: an existing pair comes back unchanged and without its secret.
    pub fn provision(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
    ) -> DomainResult<IssuedCredential> {
        let slot = SlotKey::new(application_id, environment_id);
        self.locks.with(&slot, || self.provision_unlocked(&slot))
    }

    /// Replace the secret of the active pair, keeping its client identifier.
    ///
    /// `NotFound` when the slot has no active pair.
    pub fn rotate(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
    ) -> DomainResult<IssuedCredential> {
        let slot = SlotKey::new(application_id, environment_id);
        self.locks.with(&slot, || self.rotate_unlocked(&slot))
    }

    /// Clear the active pair. Returns the revoked client identifier, if any.
    pub fn revoke(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
    ) -> DomainResult<Option<ClientId>> {
        let slot = SlotKey::new(application_id, environment_id);
        self.locks.with(&slot, || self.revoke_unlocked(&slot))
    }

    /// Revoke every slot of one application. Returns the environments affected.
    ///
    /// The slot lock of every given environment is taken, including slots
    /// that are still empty, so a provision holding one of those locks
    /// finishes before the slot is swept. Stored slots outside `environments`
    /// are swept as well.
    pub fn revoke_all(
        &self,
        application_id: ApplicationId,
        environments: impl IntoIterator<Item = EnvironmentId>,
    ) -> DomainResult<Vec<EnvironmentId>> {
        let stored: Vec<EnvironmentId> = self
            .slots
            .list()?
            .into_iter()
            .filter(|s| s.application_id == application_id)
            .map(|s| s.environment_id)
            .collect();

        let mut seen = HashSet::new();
        let mut revoked = Vec::new();
        for environment_id in environments.into_iter().chain(stored) {
            if !seen.insert(environment_id) {
                continue;
            }
            let key = SlotKey::new(application_id, environment_id);
            if self.locks.with(&key, || self.revoke_unlocked(&key))?.is_some() {
                revoked.push(environment_id);
            }
        }
        Ok(revoked)
    }

    /// Whether `client_id`/`secret` is the active pair of the slot.
    ///
    /// The secret is compared by digest in constant time.
    pub fn verify(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
        client_id: &str,
        secret: &str,
    ) -> DomainResult<bool> {
        let slot = SlotKey::new(application_id, environment_id);
        Ok(self
            .slots
            .get(&slot)?
            .is_some_and(|s| s.verify(client_id, secret)))
    }

    pub fn current(
        &self,
        application_id: ApplicationId,
        environment_id: EnvironmentId,
    ) -> DomainResult<Option<CredentialHandle>> {
        let slot = SlotKey::new(application_id, environment_id);
        Ok(self.slots.get(&slot)?.and_then(|s| s.handle()))
    }

    /// Run `f` while holding the lock of `slot`.
    pub(crate) fn with_slot<R>(
        &self,
        slot: &SlotKey,
        f: impl FnOnce() -> DomainResult<R>,
    ) -> DomainResult<R> {
        self.locks.with(slot, f)
    }

    #[cfg(test)]
    pub(crate) fn slot_contenders(&self, slot: &SlotKey) -> usize {
        self.locks.contenders(slot)
    }

    /// `provision` for a caller that already holds the slot lock.
    pub(crate) fn provision_unlocked(&self, slot: &SlotKey) -> DomainResult<IssuedCredential> {
        let mut state = self
            .slots
            .get(slot)?
            .unwrap_or_else(|| CredentialSlot::empty(slot.application_id, slot.environment_id));
        if let Some(handle) = state.handle() {
            tracing::debug!(application_id = %slot.application_id, environment_id = %slot.environment_id, "reusing active credential");
            return Ok(IssuedCredential {
                handle,
                client_secret: None,
            });
        }

        let client_id = self.fresh_client_id()?;
        let secret = self.generator.client_secret();
        let now = Utc::now();
        let superseded = state.install(client_id.clone(), SecretDigest::of(&secret), now);
        let handle = state
            .handle()
            .ok_or_else(|| DomainError::internal("credential slot empty after install"))?;
        self.slots.upsert(*slot, state)?;

        tracing::info!(
            application_id = %slot.application_id,
            environment_id = %slot.environment_id,
            client_id = %client_id,
            fingerprint = %handle.secret_fingerprint,
            "credential issued"
        );
        self.events.emit(ApplicationEvent::CredentialIssued {
            application_id: slot.application_id,
            environment_id: slot.environment_id,
            client_id,
            superseded,
            occurred_at: now,
        });
        Ok(IssuedCredential {
            handle,
            client_secret: Some(secret),
        })
    }

    pub(crate) fn rotate_unlocked(&self, slot: &SlotKey) -> DomainResult<IssuedCredential> {
        let secret = self.generator.client_secret();
        let now = Utc::now();
        let digest = SecretDigest::of(&secret);

        let handle = self
            .slots
            .update(slot, |state| {
                state.rotate(digest, now)?;
                state
                    .handle()
                    .ok_or_else(|| DomainError::internal("credential slot empty after rotate"))
            })?
            .ok_or_else(|| DomainError::not_found("credential", slot))?;

        tracing::info!(
            application_id = %slot.application_id,
            environment_id = %slot.environment_id,
            client_id = %handle.client_id,
            generation = handle.generation,
            "credential rotated"
        );
        self.events.emit(ApplicationEvent::CredentialRotated {
            application_id: slot.application_id,
            environment_id: slot.environment_id,
            client_id: handle.client_id.clone(),
            generation: handle.generation,
            occurred_at: now,
        });
        Ok(IssuedCredential {
            handle,
            client_secret: Some(secret),
        })
    }

    pub(crate) fn revoke_unlocked(&self, slot: &SlotKey) -> DomainResult<Option<ClientId>> {
        let revoked = self.slots.update(slot, |state| Ok(state.revoke()))?.flatten();
        match &revoked {
            Some(client_id) => {
                tracing::info!(
                    application_id = %slot.application_id,
                    environment_id = %slot.environment_id,
                    client_id = %client_id,
                    "credential revoked"
                );
                self.events.emit(ApplicationEvent::CredentialRevoked {
                    application_id: slot.application_id,
                    environment_id: slot.environment_id,
                    client_id: client_id.clone(),
                    occurred_at: Utc::now(),
                });
            }
            None => tracing::debug!(application_id = %slot.application_id, environment_id = %slot.environment_id, "no active credential to revoke"),
        }
        Ok(revoked)
    }

    /// Draw a client identifier that has never been issued before.
    fn fresh_client_id(&self) -> DomainResult<ClientId> {
        let mut issued = self.issued.lock().map_err(poisoned("issued client ids"))?;
        for _ in 0..MAX_CLIENT_ID_ATTEMPTS {
            let candidate = self.generator.client_id();
            if issued.insert(candidate.clone()) {
                return Ok(ClientId::new(candidate));
            }
        }
        Err(DomainError::internal("could not draw an unused client identifier"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    fn manager() -> CredentialManager {
        CredentialManager::in_memory(32, Arc::new(EventSink::default()))
    }

    #[test]
    fn provision_is_idempotent() {
        let m = manager();
        let (app, env) = (ApplicationId::new(), EnvironmentId::new());
        let first = m.provision(app, env).unwrap();
        let second = m.provision(app, env).unwrap();
        assert!(first.client_secret.is_some());
        assert!(second.client_secret.is_none());
        assert_eq!(first.handle.client_id, second.handle.client_id);
        assert_eq!(first.handle, second.handle);
    }

    #[test]
    fn slots_are_independent_per_environment() {
        let m = manager();
        let app = ApplicationId::new();
        let dev = m.provision(app, EnvironmentId::new()).unwrap();
        let prod = m.provision(app, EnvironmentId::new()).unwrap();
        assert_ne!(dev.handle.client_id, prod.handle.client_id);
    }

    #[test]
    fn rotate_keeps_client_id_and_invalidates_old_secret() {
        let m = manager();
        let (app, env) = (ApplicationId::new(), EnvironmentId::new());
        let issued = m.provision(app, env).unwrap();
        let old_secret = issued.client_secret.unwrap();
        let client_id = issued.handle.client_id.as_str().to_string();
        assert!(m.verify(app, env, &client_id, &old_secret).unwrap());

        let rotated = m.rotate(app, env).unwrap();
        let new_secret = rotated.client_secret.unwrap();
        assert_eq!(rotated.handle.client_id.as_str(), client_id);
        assert_eq!(rotated.handle.generation, 2);
        assert_ne!(new_secret, old_secret);
        assert!(!m.verify(app, env, &client_id, &old_secret).unwrap());
        assert!(m.verify(app, env, &client_id, &new_secret).unwrap());
    }

    #[test]
    fn rotate_without_active_pair_is_not_found() {
        let m = manager();
        let err = m.rotate(ApplicationId::new(), EnvironmentId::new()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "credential", .. }));
    }

    #[test]
    fn revoke_then_provision_yields_a_new_client_id() {
        let m = manager();
        let (app, env) = (ApplicationId::new(), EnvironmentId::new());
        let first = m.provision(app, env).unwrap();
        let secret = first.client_secret.unwrap();

        let revoked = m.revoke(app, env).unwrap();
        assert_eq!(revoked.as_ref(), Some(&first.handle.client_id));
        assert!(m.current(app, env).unwrap().is_none());
        assert!(!m.verify(app, env, first.handle.client_id.as_str(), &secret).unwrap());
        assert!(m.revoke(app, env).unwrap().is_none());

        let second = m.provision(app, env).unwrap();
        assert_ne!(second.handle.client_id, first.handle.client_id);
    }

    #[test]
    fn revoke_all_clears_every_slot_of_the_application() {
        let m = manager();
        let app = ApplicationId::new();
        let other = ApplicationId::new();
        let (dev, prod) = (EnvironmentId::new(), EnvironmentId::new());
        m.provision(app, dev).unwrap();
        m.provision(app, prod).unwrap();
        m.provision(other, dev).unwrap();

        let mut revoked = m.revoke_all(app, [dev]).unwrap();
        revoked.sort();
        let mut expected = vec![dev, prod];
        expected.sort();
        assert_eq!(revoked, expected);
        assert!(m.current(other, dev).unwrap().is_some());
    }

    #[test]
    fn revoke_all_waits_for_a_provision_in_progress() {
        let m = Arc::new(manager());
        let app = ApplicationId::new();
        let env = EnvironmentId::new();
        let slot = SlotKey::new(app, env);
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();

        // Holds the slot lock and issues the first credential only after
        // the sweep has started.
        let provisioner = {
            let m = m.clone();
            thread::spawn(move || {
                m.with_slot(&slot, || {
                    entered_tx.send(()).unwrap();
                    thread::sleep(std::time::Duration::from_millis(50));
                    m.provision_unlocked(&slot)
                })
                .unwrap()
            })
        };

        entered_rx.recv().unwrap();
        let revoked = m.revoke_all(app, [env]).unwrap();
        let issued = provisioner.join().unwrap();

        assert_eq!(revoked, vec![env]);
        assert!(issued.client_secret.is_some());
        assert!(m.current(app, env).unwrap().is_none());
    }

    /// Always returns the same client id, so the second issue must fail.
    struct FixedGenerator;

    impl CredentialGenerator for FixedGenerator {
        fn client_id(&self) -> String {
            "fixed".to_string()
        }

        fn client_secret(&self) -> String {
            "secret".to_string()
        }
    }

    #[test]
    fn client_ids_are_never_reissued() {
        let m = CredentialManager::new(
            InMemorySlotStore::new("slots"),
            FixedGenerator,
            Arc::new(EventSink::default()),
        );
        let (app, env) = (ApplicationId::new(), EnvironmentId::new());
        m.provision(app, env).unwrap();
        m.revoke(app, env).unwrap();
        let err = m.provision(app, env).unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));
    }

    #[test]
    fn concurrent_first_provision_converges_on_one_pair() {
        const N: usize = 16;
        let m = Arc::new(manager());
        let (app, env) = (ApplicationId::new(), EnvironmentId::new());
        let barrier = Arc::new(Barrier::new(N));
        let with_secret = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let (m, barrier, with_secret) = (m.clone(), barrier.clone(), with_secret.clone());
                thread::spawn(move || {
                    barrier.wait();
                    let issued = m.provision(app, env).unwrap();
                    if issued.client_secret.is_some() {
                        with_secret.fetch_add(1, Ordering::SeqCst);
                    }
                    issued.handle.client_id
                })
            })
            .collect();
        let ids: HashSet<ClientId> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(ids.len(), 1);
        assert_eq!(with_secret.load(Ordering::SeqCst), 1);
    }
}
