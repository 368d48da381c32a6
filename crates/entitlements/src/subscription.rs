use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use devportal_core::{
    AggregateRoot, ApplicationId, EnvironmentId, ProductId, SubscriptionId, UserId,
};

/// The unit of entitlement state: (application, product, environment).
///
/// At most one subscription exists per key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntitlementKey {
    pub application_id: ApplicationId,
    pub product_id: ProductId,
    pub environment_id: EnvironmentId,
}

impl EntitlementKey {
    pub fn new(
        application_id: ApplicationId,
        product_id: ProductId,
        environment_id: EnvironmentId,
    ) -> Self {
        Self {
            application_id,
            product_id,
            environment_id,
        }
    }

    /// The credential slot this entitlement authenticates with.
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.application_id, self.environment_id)
    }
}

impl core::fmt::Display for EntitlementKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "application={} product={} environment={}",
            self.application_id, self.product_id, self.environment_id
        )
    }
}

/// Key of a credential slot: (application, environment).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub application_id: ApplicationId,
    pub environment_id: EnvironmentId,
}

impl SlotKey {
    pub fn new(application_id: ApplicationId, environment_id: EnvironmentId) -> Self {
        Self {
            application_id,
            environment_id,
        }
    }
}

impl core::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "application={} environment={}",
            self.application_id, self.environment_id
        )
    }
}

/// Persisted record establishing an entitlement.
///
/// It stays recorded even if the product is later deprecated or disabled;
/// whether it currently grants access is decided at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub application_id: ApplicationId,
    pub product_id: ProductId,
    pub environment_id: EnvironmentId,
    pub version: u64,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    pub created_by: UserId,
    pub changed_by: UserId,
}

impl Subscription {
    pub fn create(id: SubscriptionId, key: EntitlementKey, actor: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            application_id: key.application_id,
            product_id: key.product_id,
            environment_id: key.environment_id,
            version: 1,
            created: now,
            changed: now,
            created_by: actor,
            changed_by: actor,
        }
    }

    pub fn key(&self) -> EntitlementKey {
        EntitlementKey::new(self.application_id, self.product_id, self.environment_id)
    }
}

impl AggregateRoot for Subscription {
    type Id = SubscriptionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
