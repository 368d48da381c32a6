//! A committed event plus its position in the portal-wide stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Event;

/// What projections and bus listeners receive.
///
/// `sequence` is assigned once per emitted event and increases across the
/// whole portal, so a listener can order envelopes and skip ones it has seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    sequence: u64,
    event_id: Uuid,
    aggregate_id: Uuid,
    aggregate_type: String,
    recorded_at: DateTime<Utc>,
    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    /// Seal an event at `sequence` with a fresh event id.
    pub fn seal(
        sequence: u64,
        aggregate_id: Uuid,
        aggregate_type: impl Into<String>,
        payload: E,
    ) -> Self {
        Self {
            sequence,
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            recorded_at: Utc::now(),
            payload,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}

impl<E> EventEnvelope<E> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether this envelope comes after `last_applied` in the stream.
    pub fn follows(&self, last_applied: u64) -> bool {
        self.sequence > last_applied
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// When the envelope was sealed (publication time).
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
