//! Seat inventory decrementer.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use bus::{EventBus, EventEnvelope, EventId, topics};
use common::TripId;
use domain::{LOW_SEAT_THRESHOLD, SeatAlertEvent, SeatInventory, TicketEvent};
use store::{DocumentStore, Filter, Patch, collections};

use crate::worker::ConsumerHandler;
use crate::{Result, ServiceError};

/// Consumes `ticket-purchase` events and decrements per-trip seat counts.
///
/// At-least-once delivery makes redelivery routine, so every event id is
/// remembered and a repeat is a logged no-op rather than a double
/// decrement. The count clamps at zero; oversell prevention lives ahead
/// of ticket issuance, not here.
pub struct SeatInventoryConsumer<S, B> {
    store: Arc<S>,
    bus: Arc<B>,
    processed: Mutex<HashSet<EventId>>,
}

impl<S, B> SeatInventoryConsumer<S, B>
where
    S: DocumentStore,
    B: EventBus,
{
    /// Creates a new consumer.
    pub fn new(store: Arc<S>, bus: Arc<B>) -> Self {
        Self {
            store,
            bus,
            processed: Mutex::new(HashSet::new()),
        }
    }

    /// Registers a trip with all seats available.
    pub async fn seed_trip(&self, trip_id: TripId, total_seats: u32) -> Result<()> {
        let inventory = SeatInventory::new(trip_id, total_seats);
        let doc = serde_json::to_value(&inventory)?;
        self.store.insert(collections::SEAT_INVENTORY, doc).await?;
        tracing::info!(%trip_id, total_seats, "trip inventory seeded");
        Ok(())
    }

    /// Returns the current available count for a trip.
    pub async fn available(&self, trip_id: TripId) -> Result<u32> {
        Ok(self.load(trip_id).await?.available_seats)
    }

    /// Processes one purchase event.
    #[tracing::instrument(skip(self, envelope), fields(event_id = %envelope.event_id))]
    pub async fn handle_purchase(&self, envelope: &EventEnvelope) -> Result<()> {
        {
            let mut processed = self.processed.lock().await;
            if !processed.insert(envelope.event_id) {
                tracing::info!(event_id = %envelope.event_id, "duplicate delivery skipped");
                metrics::counter!("inventory_duplicates_skipped_total").increment(1);
                return Ok(());
            }
        }

        let event: TicketEvent = serde_json::from_value(envelope.payload.clone())?;
        let TicketEvent::Purchased { trip_id, ticket_id, .. } = event;

        // Passes are not bound to a trip and consume no seat.
        let Some(trip_id) = trip_id else {
            tracing::debug!(%ticket_id, "trip-less purchase, no seat to decrement");
            return Ok(());
        };

        let mut inventory = match self.load(trip_id).await {
            Ok(inventory) => inventory,
            Err(error) => {
                // Unprocessed; the redelivery must get another chance.
                self.processed.lock().await.remove(&envelope.event_id);
                return Err(error);
            }
        };
        let available = inventory.adjust(-1);

        let filter = Filter::new().eq("trip_id", trip_id.to_string());
        let patch = Patch::new().set("available_seats", available);
        let updated = self
            .store
            .update_one(collections::SEAT_INVENTORY, &filter, &patch)
            .await;
        if !matches!(updated, Ok(true)) {
            self.processed.lock().await.remove(&envelope.event_id);
            updated?;
            return Err(ServiceError::Downstream(format!(
                "inventory for trip {trip_id} vanished mid-update"
            )));
        }

        metrics::counter!("seats_decremented_total").increment(1);
        tracing::info!(%trip_id, available, "seat decremented");

        // Alert at every event at or below the threshold, not only at the
        // crossing; operational tooling downstream dedupes.
        if inventory.is_low() {
            let alert = SeatAlertEvent::LowSeats {
                trip_id,
                available_seats: available,
                threshold: LOW_SEAT_THRESHOLD,
            };
            let payload = serde_json::to_value(&alert)?;
            if let Err(error) = self
                .bus
                .publish(topics::SEAT_ALERTS, &trip_id.to_string(), payload)
                .await
            {
                tracing::warn!(%trip_id, %error, "seat alert publish failed");
            } else {
                metrics::counter!("seat_alerts_total").increment(1);
            }
        }

        Ok(())
    }

    async fn load(&self, trip_id: TripId) -> Result<SeatInventory> {
        let filter = Filter::new().eq("trip_id", trip_id.to_string());
        let doc = self
            .store
            .find_one(collections::SEAT_INVENTORY, &filter)
            .await?
            .ok_or_else(|| {
                ServiceError::Downstream(format!("no seat inventory for trip {trip_id}"))
            })?;
        Ok(serde_json::from_value(doc)?)
    }
}

#[async_trait]
impl<S, B> ConsumerHandler for SeatInventoryConsumer<S, B>
where
    S: DocumentStore,
    B: EventBus,
{
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        self.handle_purchase(envelope).await
    }
}
