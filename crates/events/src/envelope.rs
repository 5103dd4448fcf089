use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;

/// Envelope for a published event: identity + subject metadata + payload.
///
/// `subject_type`/`subject_id` name the record the event is about (e.g.
/// `"order"`, `42`), so consumers can route without decoding the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    event_type: String,
    subject_type: String,
    subject_id: i64,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        event_type: impl Into<String>,
        subject_type: impl Into<String>,
        subject_id: i64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            subject_type: subject_type.into(),
            subject_id,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn subject_type(&self) -> &str {
        &self.subject_type
    }

    pub fn subject_id(&self) -> i64 {
        self.subject_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, taking type and time from the event itself.
    ///
    /// Uses a time-ordered UUIDv7 as the event id.
    pub fn wrap(subject_type: impl Into<String>, subject_id: i64, payload: E) -> Self {
        Self::new(
            Uuid::now_v7(),
            payload.event_type(),
            subject_type,
            subject_id,
            payload.occurred_at(),
            payload,
        )
    }
}
