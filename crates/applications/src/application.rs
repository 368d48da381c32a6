use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use devportal_core::{AggregateRoot, ApplicationId, DomainError, DomainResult, UserId};

/// Lifecycle status of an application.
///
/// ```text
/// draft ──(first subscription)──> active <──(manual)──> suspended
///   │                               │                      │
///   └───────────────────────────────┴──────> revoked <─────┘   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Draft,
    Active,
    Suspended,
    Revoked,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Active => "active",
            ApplicationStatus::Suspended => "suspended",
            ApplicationStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "revoked" => Ok(Self::Revoked),
            other => Err(DomainError::validation(format!(
                "unknown application status '{other}'"
            ))),
        }
    }

    /// Check a transition against the lifecycle table.
    ///
    /// Returns `Ok(false)` for a same-status no-op, `Ok(true)` for a real move.
    pub fn check_transition(self, to: ApplicationStatus) -> DomainResult<bool> {
        use ApplicationStatus::*;

        match (self, to) {
            (Revoked, _) => Err(DomainError::invalid_state(
                "application is revoked; no further status changes are allowed",
            )),
            (from, to) if from == to => Ok(false),
            (_, Revoked) => Ok(true),
            (Draft, Active) | (Active, Suspended) | (Suspended, Active) => Ok(true),
            (from, to) => Err(DomainError::invalid_state(format!(
                "application cannot move from {} to {}",
                from.as_str(),
                to.as_str()
            ))),
        }
    }
}

impl core::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth grant types an application may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    ClientCredentials,
    AuthorizationCode,
    RefreshToken,
    Password,
    Implicit,
}

/// Input for registering an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub grant_types: Vec<GrantType>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewApplication {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            grant_types: vec![GrantType::ClientCredentials],
            tags: Vec::new(),
        }
    }
}

/// Partial update of an application; `None` leaves a field unchanged.
///
/// Status is not patchable; it moves only through the lifecycle table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub grant_types: Option<Vec<GrantType>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl ApplicationPatch {
    pub fn is_empty(&self) -> bool {
        self == &ApplicationPatch::default()
    }
}

/// Aggregate root: a consumer application.
///
/// Credentials are not stored here; they live in per-environment credential
/// slots keyed by `(application, environment)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub description: Option<String>,
    pub grant_types: BTreeSet<GrantType>,
    pub status: ApplicationStatus,
    pub tags: BTreeSet<String>,
    pub revision: u64,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    pub created_by: UserId,
    pub changed_by: UserId,
}

impl Application {
    /// Register a new application in `draft` status.
    pub fn register(
        id: ApplicationId,
        spec: NewApplication,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: validate_name(&spec.name)?,
            description: spec.description,
            grant_types: validate_grants(spec.grant_types)?,
            status: ApplicationStatus::Draft,
            tags: normalize_tags(&spec.tags),
            revision: 1,
            created: now,
            changed: now,
            created_by: actor,
            changed_by: actor,
        })
    }

    /// Apply a descriptive change. Revoked applications are frozen.
    pub fn apply_patch(
        &mut self,
        patch: ApplicationPatch,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if patch.is_empty() {
            return Err(DomainError::validation("application patch is empty"));
        }
        if self.status == ApplicationStatus::Revoked {
            return Err(DomainError::invalid_state(format!(
                "application {} is revoked",
                self.id
            )));
        }

        let name = patch.name.as_deref().map(validate_name).transpose()?;
        let grant_types = patch.grant_types.map(validate_grants).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(grant_types) = grant_types {
            self.grant_types = grant_types;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(&tags);
        }
        self.revision += 1;
        self.changed = now.max(self.changed);
        self.changed_by = actor;
        Ok(())
    }

    /// Move to `to` if the lifecycle table allows it.
    ///
    /// Returns the previous status when something changed, `None` for a no-op.
    pub fn set_status(
        &mut self,
        to: ApplicationStatus,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<ApplicationStatus>> {
        if !self.status.check_transition(to)? {
            return Ok(None);
        }
        let from = self.status;
        self.status = to;
        self.revision += 1;
        self.changed = now.max(self.changed);
        self.changed_by = actor;
        Ok(Some(from))
    }

    /// `draft -> active` on first successful subscription; no-op otherwise.
    pub fn activate_if_draft(&mut self, actor: UserId, now: DateTime<Utc>) -> bool {
        if self.status != ApplicationStatus::Draft {
            return false;
        }
        self.set_status(ApplicationStatus::Active, actor, now).is_ok()
    }

    /// Fails with `InvalidState` unless the application may take new subscriptions.
    pub fn ensure_can_subscribe(&self) -> DomainResult<()> {
        match self.status {
            ApplicationStatus::Draft | ApplicationStatus::Active => Ok(()),
            ApplicationStatus::Suspended | ApplicationStatus::Revoked => {
                Err(DomainError::invalid_state(format!(
                    "application {} is {}",
                    self.id, self.status
                )))
            }
        }
    }
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("application name cannot be empty"));
    }
    Ok(name.to_string())
}

fn validate_grants(grants: Vec<GrantType>) -> DomainResult<BTreeSet<GrantType>> {
    if grants.is_empty() {
        return Err(DomainError::validation(
            "application must allow at least one grant type",
        ));
    }
    Ok(grants.into_iter().collect())
}

fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

impl AggregateRoot for Application {
    type Id = ApplicationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.revision
    }
}
