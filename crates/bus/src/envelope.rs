use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic names used by the choreography.
///
/// All but `seat-alerts` have a consumer inside the core; `seat-alerts` is
/// publish-only and consumed by external operational tooling.
pub mod topics {
    /// Ticket purchase events, keyed by trip id.
    pub const TICKET_PURCHASE: &str = "ticket-purchase";
    /// Payment confirmation/failure/refund events, keyed by passenger id.
    pub const PAYMENT_PROCESSED: &str = "payment-processed";
    /// Schedule delay and cancellation events, keyed by trip id.
    pub const SCHEDULE_UPDATES: &str = "schedule-updates";
    /// Ticket validation events, keyed by passenger id.
    pub const TICKET_VALIDATIONS: &str = "ticket-validations";
    /// Service disruption broadcasts, keyed by trip id.
    pub const SERVICE_DISRUPTIONS: &str = "service-disruptions";
    /// Low-seat alerts emitted by the inventory decrementer, keyed by trip id.
    pub const SEAT_ALERTS: &str = "seat-alerts";
}

/// Unique identifier for a message on the bus.
///
/// Consumers use it to de-duplicate redeliveries, so it must be stable
/// across deliveries of the same message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message on the bus: topic, routing key, serialized domain event.
///
/// The payload is opaque JSON at this layer; typed decoding happens at the
/// consumer's deserialization boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this message, stable across redeliveries.
    pub event_id: EventId,

    /// The topic this message was published to.
    pub topic: String,

    /// Routing key determining the partition (trip id, passenger id, ...).
    pub key: String,

    /// The serialized domain event.
    pub payload: serde_json::Value,

    /// When the message was published.
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    /// Creates a new envelope with a fresh event id and current timestamp.
    pub fn new(
        topic: impl Into<String>,
        key: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            topic: topic.into(),
            key: key.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Replaces the event id; used by tests that simulate redelivery of a
    /// specific message.
    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_new_creates_unique_ids() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn envelope_carries_topic_key_and_payload() {
        let envelope = EventEnvelope::new(
            topics::TICKET_PURCHASE,
            "trip-1",
            serde_json::json!({"kind": "single"}),
        );
        assert_eq!(envelope.topic, "ticket-purchase");
        assert_eq!(envelope.key, "trip-1");
        assert_eq!(envelope.payload["kind"], "single");
    }

    #[test]
    fn envelope_serialization_roundtrip() {
        let envelope = EventEnvelope::new(topics::SEAT_ALERTS, "trip-2", serde_json::json!(7));
        let json = serde_json::to_string(&envelope).unwrap();
        let back: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_id, envelope.event_id);
        assert_eq!(back.key, envelope.key);
    }
}
