//! Deployment environments (development, production, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateRoot;
use crate::error::{DomainError, DomainResult};
use crate::id::{EnvironmentId, UserId};

pub const DEVELOPMENT: &str = "development";
pub const PRODUCTION: &str = "production";

/// Which of the two endpoint scopes an environment reads.
///
/// Environments are arbitrary named values; only the scope lookup on an API
/// endpoint distinguishes production from everything else.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    Development,
    Production,
}

impl EnvironmentKind {
    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(DomainError::validation(format!(
                "unknown environment kind '{other}' (expected development or production)"
            ))),
        }
    }
}

/// A named, isolated deployment environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: EnvironmentId,
    pub name: String,
    pub version: u64,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    pub created_by: UserId,
    pub changed_by: UserId,
}

impl Environment {
    /// Build a new environment; the name is trimmed and lower-cased.
    pub fn new(
        id: EnvironmentId,
        name: &str,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = Self::normalize_name(name)?;
        Ok(Self {
            id,
            name,
            version: 1,
            created: now,
            changed: now,
            created_by: actor,
            changed_by: actor,
        })
    }

    pub fn normalize_name(name: &str) -> DomainResult<String> {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(DomainError::validation("environment name cannot be empty"));
        }
        Ok(name)
    }

    /// Scope kind used when resolving endpoint scopes for this environment.
    pub fn kind(&self) -> EnvironmentKind {
        if self.name == PRODUCTION || self.name == "prod" {
            EnvironmentKind::Production
        } else {
            EnvironmentKind::Development
        }
    }
}

impl AggregateRoot for Environment {
    type Id = EnvironmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
