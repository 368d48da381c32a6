//! Per-environment client credentials.
//!
//! A slot holds at most one active pair. Installing a new pair supersedes the
//! old one; rotating replaces only the secret. Secrets are kept as SHA-256
//! digests and compared in constant time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use devportal_core::{ApplicationId, DomainError, DomainResult, EnvironmentId, ValueObject};

/// Public OAuth client identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ClientId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 digest of a client secret. The plaintext is never stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretDigest([u8; 32]);

impl SecretDigest {
    pub fn of(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Constant-time comparison against a presented secret.
    pub fn matches(&self, presented: &str) -> bool {
        let other = Self::of(presented);
        self.0.ct_eq(&other.0).into()
    }

    /// Short, non-reversible handle suitable for display and logs.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl ValueObject for SecretDigest {}

impl core::fmt::Debug for SecretDigest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SecretDigest({}…)", self.fingerprint())
    }
}

/// The active client-identifier/secret pair of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub client_id: ClientId,
    pub secret: SecretDigest,
    /// Bumped on every rotation of this client identifier.
    pub generation: u32,
    pub issued_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
}

/// Credential slot for one `(application, environment)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSlot {
    pub application_id: ApplicationId,
    pub environment_id: EnvironmentId,
    pub active: Option<CredentialPair>,
    pub revision: u64,
}

impl CredentialSlot {
    pub fn empty(application_id: ApplicationId, environment_id: EnvironmentId) -> Self {
        Self {
            application_id,
            environment_id,
            active: None,
            revision: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Install a freshly issued pair, superseding any prior pair.
    ///
    /// Returns the client identifier that was superseded, if any.
    pub fn install(
        &mut self,
        client_id: ClientId,
        secret: SecretDigest,
        now: DateTime<Utc>,
    ) -> Option<ClientId> {
        let previous = self.active.take().map(|p| p.client_id);
        self.active = Some(CredentialPair {
            client_id,
            secret,
            generation: 1,
            issued_at: now,
            rotated_at: None,
        });
        self.revision += 1;
        previous
    }

    /// Replace the secret of the active pair, keeping its client identifier.
    ///
    /// The previous secret stops matching as soon as this returns.
    pub fn rotate(&mut self, secret: SecretDigest, now: DateTime<Utc>) -> DomainResult<&CredentialPair> {
        let label = self.key_label();
        let pair = self
            .active
            .as_mut()
            .ok_or_else(|| DomainError::not_found("credential", label))?;
        pair.secret = secret;
        pair.generation += 1;
        pair.rotated_at = Some(now);
        self.revision += 1;
        Ok(pair)
    }

    /// Clear the active pair. Returns the revoked client identifier, if any.
    pub fn revoke(&mut self) -> Option<ClientId> {
        let revoked = self.active.take().map(|p| p.client_id);
        if revoked.is_some() {
            self.revision += 1;
        }
        revoked
    }

    /// Whether `client_id`/`secret` is the currently valid pair.
    pub fn verify(&self, client_id: &str, secret: &str) -> bool {
        match &self.active {
            Some(pair) => pair.client_id.as_str() == client_id && pair.secret.matches(secret),
            None => false,
        }
    }

    pub fn handle(&self) -> Option<CredentialHandle> {
        self.active.as_ref().map(|pair| CredentialHandle {
            application_id: self.application_id,
            environment_id: self.environment_id,
            client_id: pair.client_id.clone(),
            secret_fingerprint: pair.secret.fingerprint(),
            generation: pair.generation,
            issued_at: pair.issued_at,
            rotated_at: pair.rotated_at,
        })
    }

    fn key_label(&self) -> String {
        format!("{}/{}", self.application_id, self.environment_id)
    }
}

/// Read-only view of an active credential pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHandle {
    pub application_id: ApplicationId,
    pub environment_id: EnvironmentId,
    pub client_id: ClientId,
    pub secret_fingerprint: String,
    pub generation: u32,
    pub issued_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
}

/// Result of `provision`/`rotate`: the handle, plus the plaintext secret when
/// one was just generated. The plaintext is returned exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredential {
    pub handle: CredentialHandle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> CredentialSlot {
        CredentialSlot::empty(ApplicationId::new(), EnvironmentId::new())
    }

    #[test]
    fn digest_matches_only_its_secret() {
        let d = SecretDigest::of("s3cret");
        assert!(d.matches("s3cret"));
        assert!(!d.matches("s3cret "));
        assert_eq!(d.fingerprint().len(), 12);
    }

    #[test]
    fn debug_does_not_leak_the_digest() {
        let d = SecretDigest::of("s3cret");
        let dbg = format!("{d:?}");
        assert!(dbg.starts_with("SecretDigest("));
        assert!(!dbg.contains(&hex::encode(d.0)));
    }

    #[test]
    fn install_supersedes_previous_pair() {
        let mut s = slot();
        assert_eq!(s.install(ClientId::new("a"), SecretDigest::of("1"), Utc::now()), None);
        let previous = s.install(ClientId::new("b"), SecretDigest::of("2"), Utc::now());
        assert_eq!(previous, Some(ClientId::new("a")));
        assert!(!s.verify("a", "1"));
        assert!(s.verify("b", "2"));
    }

    #[test]
    fn rotate_keeps_client_id_and_invalidates_old_secret() {
        let mut s = slot();
        s.install(ClientId::new("client"), SecretDigest::of("old"), Utc::now());
        let pair = s.rotate(SecretDigest::of("new"), Utc::now()).unwrap();
        assert_eq!(pair.client_id, ClientId::new("client"));
        assert_eq!(pair.generation, 2);
        assert!(!s.verify("client", "old"));
        assert!(s.verify("client", "new"));
    }

    #[test]
    fn rotate_without_active_pair_is_not_found() {
        let mut s = slot();
        let err = s.rotate(SecretDigest::of("x"), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "credential", .. }));
    }

    #[test]
    fn revoke_clears_and_reports() {
        let mut s = slot();
        assert_eq!(s.revoke(), None);
        assert_eq!(s.revision, 0);
        s.install(ClientId::new("c"), SecretDigest::of("x"), Utc::now());
        assert_eq!(s.revoke(), Some(ClientId::new("c")));
        assert!(!s.is_active());
        assert!(!s.verify("c", "x"));
        assert!(s.handle().is_none());
    }
}
