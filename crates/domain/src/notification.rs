//! Notification records and recipients.

use chrono::{DateTime, Utc};
use common::{NotificationId, PassengerId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire value marking a notification addressed to every passenger.
const BROADCAST_MARKER: &str = "all";

/// Who a notification is addressed to.
///
/// Serialized as the passenger uuid string or the reserved `"all"` marker,
/// so store filters can OR-match a passenger id with the broadcast value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Passenger(PassengerId),
    AllPassengers,
}

impl Recipient {
    /// Returns the wire representation used in stored documents.
    pub fn as_wire(&self) -> String {
        match self {
            Recipient::Passenger(id) => id.to_string(),
            Recipient::AllPassengers => BROADCAST_MARKER.to_string(),
        }
    }

    /// The broadcast marker as a JSON value, for store filters.
    pub fn broadcast_value() -> serde_json::Value {
        serde_json::Value::String(BROADCAST_MARKER.to_string())
    }
}

impl Serialize for Recipient {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_wire())
    }
}

impl<'de> Deserialize<'de> for Recipient {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == BROADCAST_MARKER {
            return Ok(Recipient::AllPassengers);
        }
        s.parse::<PassengerId>()
            .map(Recipient::Passenger)
            .map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// What kind of event a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationCategory {
    ScheduleUpdate,
    TicketValidation,
    PaymentConfirmation,
    ServiceDisruption,
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationCategory::ScheduleUpdate => "schedule-update",
            NotificationCategory::TicketValidation => "ticket-validation",
            NotificationCategory::PaymentConfirmation => "payment-confirmation",
            NotificationCategory::ServiceDisruption => "service-disruption",
        };
        write!(f, "{s}")
    }
}

/// Delivery progress of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeliveryStatus {
    /// Handed to the delivery channel.
    #[default]
    Sent,

    /// Confirmed delivered to the recipient's device.
    Delivered,

    /// Acknowledged by the recipient.
    Read,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "Sent",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::Read => "Read",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rendered, persisted notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Unique notification identifier.
    pub id: NotificationId,

    /// Addressee: one passenger or the broadcast marker.
    pub recipient: Recipient,

    /// Event category the notification reports.
    pub category: NotificationCategory,

    /// Short headline.
    pub title: String,

    /// Rendered body text.
    pub body: String,

    /// Delivery progress.
    pub status: DeliveryStatus,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// Arbitrary metadata carried from the triggering event.
    pub metadata: serde_json::Value,
}

impl NotificationRecord {
    /// Creates a freshly rendered record in `Sent` status.
    pub fn new(
        recipient: Recipient,
        category: NotificationCategory,
        title: impl Into<String>,
        body: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient,
            category,
            title: title.into(),
            body: body.into(),
            status: DeliveryStatus::Sent,
            created_at: Utc::now(),
            metadata,
        }
    }

    /// Marks the notification read by its recipient.
    pub fn mark_read(&mut self) {
        self.status = DeliveryStatus::Read;
    }
}
