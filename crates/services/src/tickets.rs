//! Ticket lifecycle manager.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use bus::{EventBus, topics};
use common::{PassengerId, TicketId, TripId};
use domain::{Ticket, TicketEvent, TicketKind, ValidationEvent};
use store::{DocumentStore, Filter, Patch, collections};

use crate::{Result, ServiceError};

/// Request to issue a new ticket.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueTicketRequest {
    pub passenger_id: PassengerId,
    /// Kind as its wire string; unknown kinds are rejected before any write.
    pub kind: String,
    pub trip_id: Option<TripId>,
    pub route: Option<String>,
    /// Ride count, consulted for multi-ride only.
    pub rides: Option<u32>,
}

/// Owns the ticket collection and the ticket state machine.
///
/// Publishes `TicketEvent::Purchased` at issuance and `ValidationEvent`
/// at boarding; the store write always precedes the publish, and a failed
/// publish is logged rather than rolled back since every consumer is
/// idempotent on event id.
pub struct TicketService<S, B> {
    store: Arc<S>,
    bus: Arc<B>,
}

impl<S, B> TicketService<S, B>
where
    S: DocumentStore,
    B: EventBus,
{
    /// Creates a new ticket service.
    pub fn new(store: Arc<S>, bus: Arc<B>) -> Self {
        Self { store, bus }
    }

    /// Issues a ticket in `Created` status and announces the purchase.
    #[tracing::instrument(skip(self, request), fields(passenger_id = %request.passenger_id, kind = %request.kind))]
    pub async fn issue(&self, request: IssueTicketRequest) -> Result<Ticket> {
        let kind = TicketKind::parse(&request.kind)
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        let ticket = Ticket::issue(
            request.passenger_id,
            kind,
            request.trip_id,
            request.route,
            request.rides,
        )?;

        let doc = serde_json::to_value(&ticket)?;
        self.store.insert(collections::TICKETS, doc).await?;

        metrics::counter!("tickets_issued_total").increment(1);
        tracing::info!(ticket_id = %ticket.id, amount = %ticket.amount, "ticket issued");

        let event = TicketEvent::Purchased {
            ticket_id: ticket.id,
            passenger_id: ticket.passenger_id,
            trip_id: ticket.trip_id,
            kind: ticket.kind,
            amount: ticket.amount,
            occurred_at: ticket.created_at,
        };
        // Pass tickets have no trip; their key falls back to the ticket id.
        let key = ticket
            .trip_id
            .map(|t| t.to_string())
            .unwrap_or_else(|| ticket.id.to_string());
        self.publish_logged(topics::TICKET_PURCHASE, &key, &event)
            .await;

        Ok(ticket)
    }

    /// Marks a ticket paid. Idempotent for already-paid tickets.
    #[tracing::instrument(skip(self))]
    pub async fn mark_paid(&self, ticket_id: TicketId) -> Result<Ticket> {
        let mut ticket = self.load(ticket_id).await?;
        ticket.mark_paid().map_err(invalid_state)?;
        self.persist_status(&ticket).await?;
        tracing::info!(ticket_id = %ticket.id, "ticket marked paid");
        Ok(ticket)
    }

    /// Validates a ticket at boarding and announces the validation.
    #[tracing::instrument(skip(self))]
    pub async fn validate(&self, ticket_id: TicketId) -> Result<Ticket> {
        let mut ticket = self.load(ticket_id).await?;
        let now = Utc::now();
        ticket.validate(now).map_err(invalid_state)?;
        self.persist_status(&ticket).await?;

        metrics::counter!("tickets_validated_total").increment(1);
        tracing::info!(
            ticket_id = %ticket.id,
            remaining_rides = ?ticket.remaining_rides,
            "ticket validated"
        );

        let event = ValidationEvent::Validated {
            ticket_id: ticket.id,
            passenger_id: ticket.passenger_id,
            route: ticket.route.clone(),
            remaining_rides: ticket.remaining_rides,
            occurred_at: now,
        };
        self.publish_logged(
            topics::TICKET_VALIDATIONS,
            &ticket.passenger_id.to_string(),
            &event,
        )
        .await;

        Ok(ticket)
    }

    /// Fetches a ticket by id.
    pub async fn get(&self, ticket_id: TicketId) -> Result<Ticket> {
        self.load(ticket_id).await
    }

    async fn load(&self, ticket_id: TicketId) -> Result<Ticket> {
        let filter = Filter::new().eq("id", ticket_id.to_string());
        let doc = self
            .store
            .find_one(collections::TICKETS, &filter)
            .await?
            .ok_or(ServiceError::TicketNotFound(ticket_id))?;
        Ok(serde_json::from_value(doc)?)
    }

    async fn persist_status(&self, ticket: &Ticket) -> Result<()> {
        let filter = Filter::new().eq("id", ticket.id.to_string());
        let mut patch = Patch::new()
            .set("status", serde_json::to_value(ticket.status)?)
            .set("validated_at", serde_json::to_value(ticket.validated_at)?);
        if let Some(rides) = ticket.remaining_rides {
            patch = patch.set("remaining_rides", rides);
        }
        let updated = self
            .store
            .update_one(collections::TICKETS, &filter, &patch)
            .await?;
        if !updated {
            return Err(ServiceError::TicketNotFound(ticket.id));
        }
        Ok(())
    }

    async fn publish_logged<E: serde::Serialize>(&self, topic: &str, key: &str, event: &E) {
        let payload = match serde_json::to_value(event) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(topic, %error, "failed to serialize event");
                return;
            }
        };
        if let Err(error) = self.bus.publish(topic, key, payload).await {
            tracing::warn!(topic, %error, "event publish failed; consumers will not see it");
        }
    }
}

fn invalid_state(err: domain::DomainError) -> ServiceError {
    match err {
        domain::DomainError::InvalidTicketState { .. } => {
            ServiceError::InvalidState(err.to_string())
        }
        other => ServiceError::Domain(other),
    }
}
