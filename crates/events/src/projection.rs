use crate::{Event, EventEnvelope};

/// A read model folded from committed envelopes.
///
/// Applied synchronously after each commit. `apply` takes `&self` so a
/// projection can be shared between the emitter and its readers; it guards
/// its own state. Replaying an envelope whose sequence was already applied
/// is a no-op (see [`EventEnvelope::follows`]), and events the projection
/// does not care about are ignored. Nothing is returned: a projection that
/// cannot apply an event logs it and moves on.
pub trait Projection {
    type Ev: Event;

    fn apply(&self, envelope: &EventEnvelope<Self::Ev>);
}
