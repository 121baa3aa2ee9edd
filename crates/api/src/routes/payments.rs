//! Payment charge, refund, and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bus::EventBus;
use chrono::{DateTime, Utc};
use common::PaymentId;
use domain::{Payment, PaymentMethod};
use serde::{Deserialize, Serialize};
use services::ChargeRequest;
use store::DocumentStore;

use super::AppState;
use super::tickets::parse_ticket_id;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub ticket_id: String,
    pub passenger_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
}

#[derive(Deserialize)]
pub struct RefundRequest {
    pub reason: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub ticket_id: String,
    pub passenger_id: String,
    pub amount_cents: i64,
    pub method: String,
    pub status: String,
    pub ticket_synced: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            ticket_id: payment.ticket_id.to_string(),
            passenger_id: payment.passenger_id.to_string(),
            amount_cents: payment.amount.cents(),
            method: payment.method.to_string(),
            status: payment.status.to_string(),
            ticket_synced: payment.ticket_synced,
            reason: payment.reason,
            created_at: payment.created_at,
            processed_at: payment.processed_at,
        }
    }
}

// -- Handlers --

/// POST /payments — charge a passenger for a ticket.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let ticket_id = parse_ticket_id(&req.ticket_id)?;
    let passenger_id = req
        .passenger_id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid passenger_id: {e}")))?;

    let payment = state
        .payments
        .charge(ChargeRequest {
            ticket_id,
            passenger_id,
            amount_cents: req.amount_cents,
            method: req.method,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// GET /payments/:id — fetch a payment by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    let payment = state.payments.get(payment_id).await?;
    Ok(Json(payment.into()))
}

/// POST /payments/:id/refund — refund a confirmed payment.
#[tracing::instrument(skip(state, req))]
pub async fn refund<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    let payment = state.payments.refund(payment_id, &req.reason).await?;
    Ok(Json(payment.into()))
}

/// GET /tickets/:id/payments — list payments recorded against a ticket.
#[tracing::instrument(skip(state))]
pub async fn list_for_ticket<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let ticket_id = parse_ticket_id(&id)?;
    let payments = state.payments.list_by_ticket(ticket_id).await?;
    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

fn parse_payment_id(id: &str) -> Result<PaymentId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid payment id: {e}")))
}
