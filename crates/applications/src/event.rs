use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use devportal_core::{ApplicationId, EnvironmentId, UserId};
use devportal_events::Event;

use crate::application::ApplicationStatus;
use crate::credential::ClientId;

/// Facts emitted by the application registry and the credential manager.
///
/// Credential events never carry secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApplicationEvent {
    Registered {
        application_id: ApplicationId,
        name: String,
        tags: BTreeSet<String>,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    },
    Updated {
        application_id: ApplicationId,
        name: String,
        tags: BTreeSet<String>,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    },
    StatusChanged {
        application_id: ApplicationId,
        from: ApplicationStatus,
        to: ApplicationStatus,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    },
    CredentialIssued {
        application_id: ApplicationId,
        environment_id: EnvironmentId,
        client_id: ClientId,
        superseded: Option<ClientId>,
        occurred_at: DateTime<Utc>,
    },
    CredentialRotated {
        application_id: ApplicationId,
        environment_id: EnvironmentId,
        client_id: ClientId,
        generation: u32,
        occurred_at: DateTime<Utc>,
    },
    CredentialRevoked {
        application_id: ApplicationId,
        environment_id: EnvironmentId,
        client_id: ClientId,
        occurred_at: DateTime<Utc>,
    },
}

impl ApplicationEvent {
    pub fn application_id(&self) -> ApplicationId {
        match self {
            ApplicationEvent::Registered { application_id, .. }
            | ApplicationEvent::Updated { application_id, .. }
            | ApplicationEvent::StatusChanged { application_id, .. }
            | ApplicationEvent::CredentialIssued { application_id, .. }
            | ApplicationEvent::CredentialRotated { application_id, .. }
            | ApplicationEvent::CredentialRevoked { application_id, .. } => *application_id,
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.application_id().into()
    }

    pub fn aggregate_type(&self) -> &'static str {
        match self {
            ApplicationEvent::Registered { .. }
            | ApplicationEvent::Updated { .. }
            | ApplicationEvent::StatusChanged { .. } => "applications.application",
            ApplicationEvent::CredentialIssued { .. }
            | ApplicationEvent::CredentialRotated { .. }
            | ApplicationEvent::CredentialRevoked { .. } => "credentials.slot",
        }
    }
}

impl Event for ApplicationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ApplicationEvent::Registered { .. } => "applications.application.registered",
            ApplicationEvent::Updated { .. } => "applications.application.updated",
            ApplicationEvent::StatusChanged { .. } => "applications.application.status_changed",
            ApplicationEvent::CredentialIssued { .. } => "credentials.slot.issued",
            ApplicationEvent::CredentialRotated { .. } => "credentials.slot.rotated",
            ApplicationEvent::CredentialRevoked { .. } => "credentials.slot.revoked",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ApplicationEvent::Registered { occurred_at, .. }
            | ApplicationEvent::Updated { occurred_at, .. }
            | ApplicationEvent::StatusChanged { occurred_at, .. }
            | ApplicationEvent::CredentialIssued { occurred_at, .. }
            | ApplicationEvent::CredentialRotated { occurred_at, .. }
            | ApplicationEvent::CredentialRevoked { occurred_at, .. } => *occurred_at,
        }
    }
}
