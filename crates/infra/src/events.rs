//! Event fan-in for the whole portal.
//!
//! Every committed mutation is wrapped in an [`EventEnvelope`] carrying a
//! portal-wide sequence number, folded into the synchronous projections, and
//! then published on the bus for outer listeners.
//!
//! The sequencer mutex is held from numbering through publishing, so
//! projections and listeners observe envelopes in strictly ascending
//! sequence order. It is the one lock every mutation passes through, after
//! its own commit; work under it is limited to in-memory folds and a
//! channel send.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use devportal_applications::ApplicationEvent;
use devportal_catalog::CatalogEvent;
use devportal_core::{EnvironmentId, UserId};
use devportal_entitlements::SubscriptionEvent;
use devportal_events::{Event, EventBus, EventEnvelope, InMemoryEventBus, Listener, Projection};

/// Facts emitted by the environment directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvironmentEvent {
    Created {
        environment_id: EnvironmentId,
        name: String,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for EnvironmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EnvironmentEvent::Created { .. } => "environments.environment.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EnvironmentEvent::Created { occurred_at, .. } => *occurred_at,
        }
    }
}

/// Any event emitted by a portal component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "event", rename_all = "snake_case")]
pub enum PortalEvent {
    Catalog(CatalogEvent),
    Application(ApplicationEvent),
    Subscription(SubscriptionEvent),
    Environment(EnvironmentEvent),
}

impl PortalEvent {
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            PortalEvent::Catalog(e) => e.aggregate_id(),
            PortalEvent::Application(e) => e.aggregate_id(),
            PortalEvent::Subscription(e) => e.aggregate_id(),
            PortalEvent::Environment(EnvironmentEvent::Created { environment_id, .. }) => {
                (*environment_id).into()
            }
        }
    }

    pub fn aggregate_type(&self) -> &'static str {
        match self {
            PortalEvent::Catalog(e) => e.aggregate_type(),
            PortalEvent::Application(e) => e.aggregate_type(),
            PortalEvent::Subscription(_) => "entitlements.subscription",
            PortalEvent::Environment(_) => "environments.environment",
        }
    }
}

impl Event for PortalEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PortalEvent::Catalog(e) => e.event_type(),
            PortalEvent::Application(e) => e.event_type(),
            PortalEvent::Subscription(e) => e.event_type(),
            PortalEvent::Environment(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            PortalEvent::Catalog(e) => e.version(),
            PortalEvent::Application(e) => e.version(),
            PortalEvent::Subscription(e) => e.version(),
            PortalEvent::Environment(e) => e.version(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PortalEvent::Catalog(e) => e.occurred_at(),
            PortalEvent::Application(e) => e.occurred_at(),
            PortalEvent::Subscription(e) => e.occurred_at(),
            PortalEvent::Environment(e) => e.occurred_at(),
        }
    }
}

impl From<CatalogEvent> for PortalEvent {
    fn from(value: CatalogEvent) -> Self {
        PortalEvent::Catalog(value)
    }
}

impl From<ApplicationEvent> for PortalEvent {
    fn from(value: ApplicationEvent) -> Self {
        PortalEvent::Application(value)
    }
}

impl From<SubscriptionEvent> for PortalEvent {
    fn from(value: SubscriptionEvent) -> Self {
        PortalEvent::Subscription(value)
    }
}

impl From<EnvironmentEvent> for PortalEvent {
    fn from(value: EnvironmentEvent) -> Self {
        PortalEvent::Environment(value)
    }
}

pub type PortalEnvelope = EventEnvelope<PortalEvent>;

/// A projection kept in step with every emitted event.
pub type SharedProjection = Arc<dyn Projection<Ev = PortalEvent> + Send + Sync>;

/// Sequencer, synchronous projections and bus, in that order.
///
/// Components call [`EventSink::emit`] after committing a change and while
/// still holding the lock that made it, so that projections see the changes
/// to any one entity in commit order.
pub struct EventSink {
    sequence: Mutex<u64>,
    projections: Vec<SharedProjection>,
    bus: InMemoryEventBus<PortalEnvelope>,
}

impl core::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventSink")
            .field("sequence", &self.sequence)
            .field("projections", &self.projections.len())
            .field("bus", &self.bus)
            .finish()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl EventSink {
    pub fn new(projections: Vec<SharedProjection>) -> Self {
        Self {
            sequence: Mutex::new(0),
            projections,
            bus: InMemoryEventBus::new(),
        }
    }

    /// Attach a listener that receives every envelope emitted from now on.
    pub fn subscribe(&self) -> Listener<PortalEnvelope> {
        self.bus.subscribe()
    }

    /// Sequence number of the last emitted event.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.lock().map(|s| *s).unwrap_or(0)
    }

    /// Sequence, project and publish one committed event.
    ///
    /// The state change is already committed when this runs, so failures
    /// here are logged and never returned to the caller.
    pub fn emit(&self, event: impl Into<PortalEvent>) {
        let event = event.into();
        let Ok(mut sequence) = self.sequence.lock() else {
            tracing::error!(
                event_type = event.event_type(),
                "event sequencer lock poisoned; event dropped"
            );
            return;
        };
        *sequence += 1;

        let envelope = EventEnvelope::seal(
            *sequence,
            event.aggregate_id(),
            event.aggregate_type(),
            event,
        );

        for projection in &self.projections {
            projection.apply(&envelope);
        }

        tracing::debug!(
            event = %envelope.payload().label(),
            sequence = envelope.sequence(),
            aggregate_id = %envelope.aggregate_id(),
            "event emitted"
        );

        if let Err(err) = self.bus.publish(envelope) {
            tracing::warn!("failed to publish event: {err:?}");
        }
    }
}
