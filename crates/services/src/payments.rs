//! Payment coordinator and its synchronous gateway to the ticket service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use bus::{EventBus, topics};
use common::{Money, PassengerId, PaymentId, TicketId};
use domain::{Payment, PaymentEvent, PaymentMethod, TicketStatus};
use store::{DocumentStore, DocumentStoreExt, Filter, Patch, collections};

use crate::tickets::TicketService;
use crate::{Result, ServiceError};

/// Request to charge a passenger for a ticket.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeRequest {
    pub ticket_id: TicketId,
    pub passenger_id: PassengerId,
    pub amount_cents: i64,
    pub method: PaymentMethod,
}

/// Synchronous call surface into the ticket lifecycle manager.
///
/// The one cross-service call that does not go over the bus; everything
/// else is choreographed through events.
#[async_trait]
pub trait TicketGateway: Send + Sync {
    /// Fetches the current status of a ticket.
    async fn ticket_status(&self, ticket_id: TicketId) -> Result<TicketStatus>;

    /// Asks the ticket service to mark the ticket paid.
    async fn mark_paid(&self, ticket_id: TicketId) -> Result<()>;
}

/// In-process gateway wrapping a [`TicketService`] directly.
pub struct LocalTicketGateway<S, B> {
    tickets: Arc<TicketService<S, B>>,
}

impl<S, B> LocalTicketGateway<S, B> {
    pub fn new(tickets: Arc<TicketService<S, B>>) -> Self {
        Self { tickets }
    }
}

#[async_trait]
impl<S, B> TicketGateway for LocalTicketGateway<S, B>
where
    S: DocumentStore,
    B: EventBus,
{
    async fn ticket_status(&self, ticket_id: TicketId) -> Result<TicketStatus> {
        Ok(self.tickets.get(ticket_id).await?.status)
    }

    async fn mark_paid(&self, ticket_id: TicketId) -> Result<()> {
        self.tickets.mark_paid(ticket_id).await?;
        Ok(())
    }
}

/// Bounded retry with doubling backoff for the mark-paid sync call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry, doubling per attempt.
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt)
    }
}

/// Charges, refunds, and queries payments.
///
/// A confirmed charge whose mark-paid sync exhausts its retries stays
/// confirmed with `ticket_synced = false`; the passenger's money was
/// taken, so the degraded path is reconciliation, not failure.
pub struct PaymentCoordinator<S, B, G> {
    store: Arc<S>,
    bus: Arc<B>,
    gateway: G,
    retry: RetryPolicy,
    decline_all: std::sync::atomic::AtomicBool,
}

impl<S, B, G> PaymentCoordinator<S, B, G>
where
    S: DocumentStore,
    B: EventBus,
    G: TicketGateway,
{
    /// Creates a coordinator with the default retry policy.
    pub fn new(store: Arc<S>, bus: Arc<B>, gateway: G) -> Self {
        Self::with_retry(store, bus, gateway, RetryPolicy::default())
    }

    /// Creates a coordinator with an explicit retry policy.
    pub fn with_retry(store: Arc<S>, bus: Arc<B>, gateway: G, retry: RetryPolicy) -> Self {
        Self {
            store,
            bus,
            gateway,
            retry,
            decline_all: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Forces every subsequent authorization to decline. Test and
    /// circuit-breaker hook.
    pub fn set_decline_all(&self, decline: bool) {
        self.decline_all
            .store(decline, std::sync::atomic::Ordering::Relaxed);
    }

    /// Charges a passenger for a ticket.
    #[tracing::instrument(skip(self, request), fields(ticket_id = %request.ticket_id, passenger_id = %request.passenger_id))]
    pub async fn charge(&self, request: ChargeRequest) -> Result<Payment> {
        let amount = Money::from_cents(request.amount_cents);
        let mut payment = Payment::initiate(
            request.ticket_id,
            request.passenger_id,
            amount,
            request.method,
        )
        .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        // Only a Created ticket may take a charge; a second confirmed
        // payment against the same ticket is rejected here.
        let status = self.gateway.ticket_status(request.ticket_id).await?;
        if status != TicketStatus::Created {
            return Err(ServiceError::InvalidState(format!(
                "ticket {} is {status}, expected Created",
                request.ticket_id
            )));
        }

        let now = Utc::now();
        let authorized = !self.decline_all.load(std::sync::atomic::Ordering::Relaxed);
        if authorized {
            payment.confirm(now).map_err(invalid_state)?;
        } else {
            payment.fail(now, "authorization declined").map_err(invalid_state)?;
        }

        // The payment record goes in first, unsynced; losing the
        // mark-paid call leaves a Confirmed-but-unsynced record, never a
        // Paid ticket with no payment anywhere.
        let doc = serde_json::to_value(&payment)?;
        self.store.insert(collections::PAYMENTS, doc).await?;

        if authorized {
            payment.ticket_synced = self.sync_mark_paid(payment.ticket_id).await;
            if payment.ticket_synced {
                let filter = Filter::new().eq("id", payment.id.to_string());
                let patch = Patch::new().set("ticket_synced", true);
                match self
                    .store
                    .update_one(collections::PAYMENTS, &filter, &patch)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!(
                        payment_id = %payment.id,
                        "payment record missing while persisting sync flag"
                    ),
                    Err(error) => tracing::warn!(
                        payment_id = %payment.id,
                        %error,
                        "sync flag not persisted; record stays unsynced"
                    ),
                }
            } else {
                tracing::warn!(
                    payment_id = %payment.id,
                    ticket_id = %payment.ticket_id,
                    "mark-paid retries exhausted; payment confirmed but unsynced"
                );
                metrics::counter!("payments_unsynced_total").increment(1);
            }
        }

        metrics::counter!("payments_processed_total", "outcome" => payment.status.as_str())
            .increment(1);
        tracing::info!(payment_id = %payment.id, status = %payment.status, "payment processed");

        let event = if authorized {
            PaymentEvent::Confirmed {
                payment_id: payment.id,
                ticket_id: payment.ticket_id,
                passenger_id: payment.passenger_id,
                amount: payment.amount,
                occurred_at: now,
            }
        } else {
            PaymentEvent::Failed {
                payment_id: payment.id,
                ticket_id: payment.ticket_id,
                passenger_id: payment.passenger_id,
                amount: payment.amount,
                reason: payment.reason.clone().unwrap_or_default(),
                occurred_at: now,
            }
        };
        self.publish_logged(&payment.passenger_id.to_string(), &event)
            .await;

        Ok(payment)
    }

    /// Refunds a confirmed payment.
    ///
    /// Does not touch the ticket: refund-to-ticket reconciliation is an
    /// explicit external policy.
    #[tracing::instrument(skip(self, reason))]
    pub async fn refund(&self, payment_id: PaymentId, reason: &str) -> Result<Payment> {
        let mut payment = self.load(payment_id).await?;
        let now = Utc::now();
        payment.refund(now, reason).map_err(invalid_state)?;

        let filter = Filter::new().eq("id", payment.id.to_string());
        let patch = Patch::new()
            .set("status", serde_json::to_value(payment.status)?)
            .set("processed_at", serde_json::to_value(payment.processed_at)?)
            .set("reason", serde_json::to_value(&payment.reason)?);
        let updated = self
            .store
            .update_one(collections::PAYMENTS, &filter, &patch)
            .await?;
        if !updated {
            return Err(ServiceError::PaymentNotFound(payment.id));
        }

        metrics::counter!("payments_refunded_total").increment(1);
        tracing::info!(payment_id = %payment.id, "payment refunded");

        let event = PaymentEvent::Refunded {
            payment_id: payment.id,
            ticket_id: payment.ticket_id,
            passenger_id: payment.passenger_id,
            amount: payment.amount,
            reason: reason.to_string(),
            occurred_at: now,
        };
        self.publish_logged(&payment.passenger_id.to_string(), &event)
            .await;

        Ok(payment)
    }

    /// Fetches a payment by id.
    pub async fn get(&self, payment_id: PaymentId) -> Result<Payment> {
        self.load(payment_id).await
    }

    /// Lists every payment recorded against a ticket, oldest first.
    pub async fn list_by_ticket(&self, ticket_id: TicketId) -> Result<Vec<Payment>> {
        let filter = Filter::new().eq("ticket_id", ticket_id.to_string());
        let docs = self.store.find_all(collections::PAYMENTS, &filter).await?;
        docs.into_iter()
            .map(|doc| Ok(serde_json::from_value(doc)?))
            .collect()
    }

    async fn load(&self, payment_id: PaymentId) -> Result<Payment> {
        let filter = Filter::new().eq("id", payment_id.to_string());
        let doc = self
            .store
            .find_one(collections::PAYMENTS, &filter)
            .await?
            .ok_or(ServiceError::PaymentNotFound(payment_id))?;
        Ok(serde_json::from_value(doc)?)
    }

    /// Drives the bounded-retry mark-paid call; returns true on success.
    async fn sync_mark_paid(&self, ticket_id: TicketId) -> bool {
        for attempt in 0..self.retry.attempts {
            match self.gateway.mark_paid(ticket_id).await {
                Ok(()) => return true,
                Err(error) => {
                    tracing::warn!(
                        %ticket_id,
                        attempt = attempt + 1,
                        %error,
                        "mark-paid attempt failed"
                    );
                    if attempt + 1 < self.retry.attempts {
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                    }
                }
            }
        }
        false
    }

    async fn publish_logged(&self, key: &str, event: &PaymentEvent) {
        let payload = match serde_json::to_value(event) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(%error, "failed to serialize payment event");
                return;
            }
        };
        if let Err(error) = self.bus.publish(topics::PAYMENT_PROCESSED, key, payload).await {
            tracing::warn!(%error, "payment event publish failed");
        }
    }
}

fn invalid_state(err: domain::DomainError) -> ServiceError {
    match err {
        domain::DomainError::InvalidPaymentState { .. } => {
            ServiceError::InvalidState(err.to_string())
        }
        other => ServiceError::Domain(other),
    }
}
