//! Typed domain events, one enum per topic.
//!
//! Payloads on the bus are opaque JSON; these enums are the schema each
//! consumer enforces at its deserialization boundary. A payload that does
//! not match is rejected there, never deep-indexed as untyped JSON.

use chrono::{DateTime, Utc};
use common::{Money, PassengerId, PaymentId, TicketId, TripId};
use serde::{Deserialize, Serialize};

use crate::{PaymentStatus, TicketKind};

/// Events on the `ticket-purchase` topic, keyed by trip id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TicketEvent {
    /// A ticket was issued; seat inventory reacts by decrementing.
    Purchased {
        ticket_id: TicketId,
        passenger_id: PassengerId,
        trip_id: Option<TripId>,
        kind: TicketKind,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },
}

/// Events on the `payment-processed` topic, keyed by passenger id.
///
/// Tagged with the true payment status: a payment whose ticket sync failed
/// still reports `Confirmed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    Confirmed {
        payment_id: PaymentId,
        ticket_id: TicketId,
        passenger_id: PassengerId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },
    Failed {
        payment_id: PaymentId,
        ticket_id: TicketId,
        passenger_id: PassengerId,
        amount: Money,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    Refunded {
        payment_id: PaymentId,
        ticket_id: TicketId,
        passenger_id: PassengerId,
        amount: Money,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
}

impl PaymentEvent {
    /// The payment status this event reports.
    pub fn status(&self) -> PaymentStatus {
        match self {
            PaymentEvent::Confirmed { .. } => PaymentStatus::Confirmed,
            PaymentEvent::Failed { .. } => PaymentStatus::Failed,
            PaymentEvent::Refunded { .. } => PaymentStatus::Refunded,
        }
    }
}

/// Events on the `schedule-updates` topic, keyed by trip id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ScheduleEvent {
    Delayed {
        trip_id: TripId,
        route: String,
        delay_minutes: u32,
    },
    Cancelled {
        trip_id: TripId,
        route: String,
    },
}

/// Events on the `service-disruptions` topic, keyed by trip id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DisruptionEvent {
    Reported {
        route: Option<String>,
        details: String,
    },
}

/// Events on the `ticket-validations` topic, keyed by passenger id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ValidationEvent {
    Validated {
        ticket_id: TicketId,
        passenger_id: PassengerId,
        route: Option<String>,
        remaining_rides: Option<u32>,
        occurred_at: DateTime<Utc>,
    },
}

/// Events on the publish-only `seat-alerts` topic, keyed by trip id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SeatAlertEvent {
    LowSeats {
        trip_id: TripId,
        available_seats: u32,
        threshold: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_event_roundtrip() {
        let event = TicketEvent::Purchased {
            ticket_id: TicketId::new(),
            passenger_id: PassengerId::new(),
            trip_id: Some(TripId::new()),
            kind: TicketKind::SingleRide,
            amount: Money::from_cents(1500),
            occurred_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Purchased");

        let back: TicketEvent = serde_json::from_value(json).unwrap();
        let TicketEvent::Purchased { amount, .. } = back;
        assert_eq!(amount, Money::from_cents(1500));
    }

    #[test]
    fn payment_event_reports_true_status() {
        let event = PaymentEvent::Failed {
            payment_id: PaymentId::new(),
            ticket_id: TicketId::new(),
            passenger_id: PassengerId::new(),
            amount: Money::from_cents(100),
            reason: "declined".to_string(),
            occurred_at: Utc::now(),
        };
        assert_eq!(event.status(), PaymentStatus::Failed);
    }

    #[test]
    fn schema_mismatch_fails_to_deserialize() {
        let bogus = serde_json::json!({"type": "Exploded", "data": {}});
        let result: Result<ScheduleEvent, _> = serde_json::from_value(bogus);
        assert!(result.is_err());

        let untyped = serde_json::json!({"delayMinutes": 5});
        let result: Result<ScheduleEvent, _> = serde_json::from_value(untyped);
        assert!(result.is_err());
    }

    #[test]
    fn schedule_event_roundtrip() {
        let event = ScheduleEvent::Delayed {
            trip_id: TripId::new(),
            route: "Line 4".to_string(),
            delay_minutes: 12,
        };
        let json = serde_json::to_value(&event).unwrap();
        let back: ScheduleEvent = serde_json::from_value(json).unwrap();
        match back {
            ScheduleEvent::Delayed { delay_minutes, .. } => assert_eq!(delay_minutes, 12),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
