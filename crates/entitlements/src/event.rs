use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use devportal_core::{SubscriptionId, UserId};
use devportal_events::Event;

use crate::subscription::EntitlementKey;

/// Facts emitted by the entitlement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    Created {
        subscription_id: SubscriptionId,
        key: EntitlementKey,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    },
    Revoked {
        subscription_id: SubscriptionId,
        key: EntitlementKey,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl SubscriptionEvent {
    pub fn subscription_id(&self) -> SubscriptionId {
        match self {
            SubscriptionEvent::Created { subscription_id, .. }
            | SubscriptionEvent::Revoked { subscription_id, .. } => *subscription_id,
        }
    }

    pub fn key(&self) -> EntitlementKey {
        match self {
            SubscriptionEvent::Created { key, .. } | SubscriptionEvent::Revoked { key, .. } => *key,
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.subscription_id().into()
    }
}

impl Event for SubscriptionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SubscriptionEvent::Created { .. } => "entitlements.subscription.created",
            SubscriptionEvent::Revoked { .. } => "entitlements.subscription.revoked",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SubscriptionEvent::Created { occurred_at, .. }
            | SubscriptionEvent::Revoked { occurred_at, .. } => *occurred_at,
        }
    }
}
