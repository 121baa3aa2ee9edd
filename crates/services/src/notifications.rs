//! Notification dispatcher: renders and delivers passenger notifications.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use bus::{EventEnvelope, EventId, topics};
use common::{NotificationId, PassengerId};
use domain::{
    DisruptionEvent, NotificationCategory, NotificationRecord, PaymentEvent, Recipient,
    ScheduleEvent, ValidationEvent,
};
use store::{DocumentStore, DocumentStoreExt, Filter, Patch, collections};

use crate::worker::ConsumerHandler;
use crate::{Result, ServiceError};

/// Side-effecting delivery of a rendered notification.
///
/// The record is persisted before delivery; a channel failure is logged
/// and the record stays in `Sent` status.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, record: &NotificationRecord) -> Result<()>;
}

/// Delivery channel that logs each notification through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingDelivery;

#[async_trait]
impl DeliveryChannel for TracingDelivery {
    async fn deliver(&self, record: &NotificationRecord) -> Result<()> {
        tracing::info!(
            notification_id = %record.id,
            recipient = %record.recipient,
            category = %record.category,
            title = %record.title,
            "notification delivered"
        );
        Ok(())
    }
}

/// Administrative request for the synchronous send path.
#[derive(Debug, Clone, Deserialize)]
pub struct SendNotificationRequest {
    /// Passenger uuid string or the `"all"` broadcast marker.
    pub recipient: Recipient,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Fans bus events out to passengers.
///
/// One dispatcher instance serves three independent subscriptions, each
/// with its own consumer group; the handler dispatches on the envelope's
/// topic so a stalled topic never blocks another. At-least-once delivery
/// makes redelivery routine, so every event id is remembered and a
/// repeat is a logged no-op rather than a duplicate record.
pub struct NotificationDispatcher<S, C> {
    store: Arc<S>,
    channel: C,
    processed: Mutex<HashSet<EventId>>,
}

impl<S, C> NotificationDispatcher<S, C>
where
    S: DocumentStore,
    C: DeliveryChannel,
{
    /// Creates a new dispatcher.
    pub fn new(store: Arc<S>, channel: C) -> Self {
        Self {
            store,
            channel,
            processed: Mutex::new(HashSet::new()),
        }
    }

    async fn seen_before(&self, event_id: EventId) -> bool {
        let mut processed = self.processed.lock().await;
        if processed.insert(event_id) {
            false
        } else {
            tracing::info!(%event_id, "duplicate delivery skipped");
            metrics::counter!("notification_duplicates_skipped_total").increment(1);
            true
        }
    }

    /// Handles one `payment-processed` event.
    #[tracing::instrument(skip(self, envelope), fields(event_id = %envelope.event_id))]
    pub async fn handle_payment(&self, envelope: &EventEnvelope) -> Result<()> {
        if self.seen_before(envelope.event_id).await {
            return Ok(());
        }
        let event: PaymentEvent = serde_json::from_value(envelope.payload.clone())?;
        let record = match &event {
            PaymentEvent::Confirmed { passenger_id, amount, ticket_id, .. } => {
                NotificationRecord::new(
                    Recipient::Passenger(*passenger_id),
                    NotificationCategory::PaymentConfirmation,
                    "Payment confirmed",
                    format!("Your payment of {amount} was confirmed."),
                    json!({"ticket_id": ticket_id}),
                )
            }
            PaymentEvent::Failed { passenger_id, amount, reason, ticket_id, .. } => {
                NotificationRecord::new(
                    Recipient::Passenger(*passenger_id),
                    NotificationCategory::PaymentConfirmation,
                    "Payment failed",
                    format!("Your payment of {amount} failed: {reason}."),
                    json!({"ticket_id": ticket_id}),
                )
            }
            PaymentEvent::Refunded { passenger_id, amount, reason, ticket_id, .. } => {
                NotificationRecord::new(
                    Recipient::Passenger(*passenger_id),
                    NotificationCategory::PaymentConfirmation,
                    "Payment refunded",
                    format!("Your payment of {amount} was refunded: {reason}."),
                    json!({"ticket_id": ticket_id}),
                )
            }
        };
        self.persist_and_deliver_event(envelope.event_id, record).await
    }

    /// Handles one `schedule-updates` or `service-disruptions` event.
    ///
    /// Both are broadcast to every passenger.
    #[tracing::instrument(skip(self, envelope), fields(event_id = %envelope.event_id, topic = %envelope.topic))]
    pub async fn handle_schedule_or_disruption(&self, envelope: &EventEnvelope) -> Result<()> {
        if self.seen_before(envelope.event_id).await {
            return Ok(());
        }
        let record = match envelope.topic.as_str() {
            topics::SCHEDULE_UPDATES => {
                let event: ScheduleEvent = serde_json::from_value(envelope.payload.clone())?;
                match event {
                    ScheduleEvent::Delayed { trip_id, route, delay_minutes } => {
                        NotificationRecord::new(
                            Recipient::AllPassengers,
                            NotificationCategory::ScheduleUpdate,
                            "Trip delayed",
                            format!("Trip on {route} is delayed by {delay_minutes} minutes."),
                            json!({"trip_id": trip_id}),
                        )
                    }
                    ScheduleEvent::Cancelled { trip_id, route } => NotificationRecord::new(
                        Recipient::AllPassengers,
                        NotificationCategory::ScheduleUpdate,
                        "Trip cancelled",
                        format!("Trip on {route} has been cancelled."),
                        json!({"trip_id": trip_id}),
                    ),
                }
            }
            topics::SERVICE_DISRUPTIONS => {
                let event: DisruptionEvent = serde_json::from_value(envelope.payload.clone())?;
                let DisruptionEvent::Reported { route, details } = event;
                let body = match &route {
                    Some(route) => format!("Service disruption on {route}: {details}"),
                    None => format!("Service disruption: {details}"),
                };
                NotificationRecord::new(
                    Recipient::AllPassengers,
                    NotificationCategory::ServiceDisruption,
                    "Service disruption",
                    body,
                    json!({"route": route}),
                )
            }
            other => {
                return Err(ServiceError::InvalidInput(format!(
                    "unexpected topic '{other}' for schedule handler"
                )));
            }
        };
        self.persist_and_deliver_event(envelope.event_id, record).await
    }

    /// Handles one `ticket-validations` event.
    #[tracing::instrument(skip(self, envelope), fields(event_id = %envelope.event_id))]
    pub async fn handle_validation(&self, envelope: &EventEnvelope) -> Result<()> {
        if self.seen_before(envelope.event_id).await {
            return Ok(());
        }
        let event: ValidationEvent = serde_json::from_value(envelope.payload.clone())?;
        let ValidationEvent::Validated { ticket_id, passenger_id, route, remaining_rides, .. } =
            event;
        let body = match (&route, remaining_rides) {
            (Some(route), Some(rides)) => {
                format!("Ticket validated on {route}. {rides} rides remaining.")
            }
            (Some(route), None) => format!("Ticket validated on {route}."),
            (None, Some(rides)) => format!("Ticket validated. {rides} rides remaining."),
            (None, None) => "Ticket validated.".to_string(),
        };
        let record = NotificationRecord::new(
            Recipient::Passenger(passenger_id),
            NotificationCategory::TicketValidation,
            "Ticket validated",
            body,
            json!({"ticket_id": ticket_id}),
        );
        self.persist_and_deliver_event(envelope.event_id, record).await
    }

    /// Synchronous administrative send, same pipeline as the bus paths.
    #[tracing::instrument(skip(self, request), fields(recipient = %request.recipient))]
    pub async fn send(&self, request: SendNotificationRequest) -> Result<NotificationRecord> {
        if request.title.trim().is_empty() {
            return Err(ServiceError::InvalidInput("title must not be empty".into()));
        }
        let record = NotificationRecord::new(
            request.recipient,
            request.category,
            request.title,
            request.body,
            request.metadata,
        );
        self.persist_and_deliver(record.clone()).await?;
        Ok(record)
    }

    /// Marks a notification read.
    pub async fn mark_read(&self, notification_id: NotificationId) -> Result<NotificationRecord> {
        let filter = Filter::new().eq("id", notification_id.to_string());
        let doc = self
            .store
            .find_one(collections::NOTIFICATIONS, &filter)
            .await?
            .ok_or(ServiceError::NotificationNotFound(notification_id))?;
        let mut record: NotificationRecord = serde_json::from_value(doc)?;
        record.mark_read();

        let patch = Patch::new().set("status", serde_json::to_value(record.status)?);
        let updated = self
            .store
            .update_one(collections::NOTIFICATIONS, &filter, &patch)
            .await?;
        if !updated {
            return Err(ServiceError::NotificationNotFound(notification_id));
        }
        Ok(record)
    }

    /// Lists a passenger's notifications, including broadcasts, oldest
    /// first.
    pub async fn list_for_user(&self, passenger_id: PassengerId) -> Result<Vec<NotificationRecord>> {
        let filter = Filter::new().any_of(
            "recipient",
            [
                serde_json::Value::String(passenger_id.to_string()),
                Recipient::broadcast_value(),
            ],
        );
        let docs = self
            .store
            .find_all(collections::NOTIFICATIONS, &filter)
            .await?;
        docs.into_iter()
            .map(|doc| Ok(serde_json::from_value(doc)?))
            .collect()
    }

    async fn persist_and_deliver_event(
        &self,
        event_id: EventId,
        record: NotificationRecord,
    ) -> Result<()> {
        let result = self.persist_and_deliver(record).await;
        if result.is_err() {
            // Unprocessed; the redelivery must get another chance.
            self.processed.lock().await.remove(&event_id);
        }
        result
    }

    async fn persist_and_deliver(&self, record: NotificationRecord) -> Result<()> {
        let doc = serde_json::to_value(&record)?;
        self.store.insert(collections::NOTIFICATIONS, doc).await?;
        metrics::counter!("notifications_sent_total", "category" => record.category.to_string())
            .increment(1);

        if let Err(error) = self.channel.deliver(&record).await {
            tracing::warn!(notification_id = %record.id, %error, "delivery channel failed");
        }
        Ok(())
    }
}

#[async_trait]
impl<S, C> ConsumerHandler for NotificationDispatcher<S, C>
where
    S: DocumentStore,
    C: DeliveryChannel,
{
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        match envelope.topic.as_str() {
            topics::PAYMENT_PROCESSED => self.handle_payment(envelope).await,
            topics::SCHEDULE_UPDATES | topics::SERVICE_DISRUPTIONS => {
                self.handle_schedule_or_disruption(envelope).await
            }
            topics::TICKET_VALIDATIONS => self.handle_validation(envelope).await,
            other => Err(ServiceError::InvalidInput(format!(
                "dispatcher received unexpected topic '{other}'"
            ))),
        }
    }
}
