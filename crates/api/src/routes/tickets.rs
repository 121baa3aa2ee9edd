//! Ticket issuance, lookup, and validation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bus::EventBus;
use chrono::{DateTime, Utc};
use common::TicketId;
use domain::Ticket;
use serde::{Deserialize, Serialize};
use services::IssueTicketRequest;
use store::DocumentStore;

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateTicketRequest {
    pub passenger_id: String,
    pub kind: String,
    pub trip_id: Option<String>,
    pub route: Option<String>,
    pub rides: Option<u32>,
}

// -- Response types --

#[derive(Serialize)]
pub struct TicketResponse {
    pub id: String,
    pub passenger_id: String,
    pub kind: String,
    pub trip_id: Option<String>,
    pub route: Option<String>,
    pub amount_cents: i64,
    pub status: String,
    pub remaining_rides: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id.to_string(),
            passenger_id: ticket.passenger_id.to_string(),
            kind: ticket.kind.to_string(),
            trip_id: ticket.trip_id.map(|t| t.to_string()),
            route: ticket.route,
            amount_cents: ticket.amount.cents(),
            status: ticket.status.to_string(),
            remaining_rides: ticket.remaining_rides,
            created_at: ticket.created_at,
            validated_at: ticket.validated_at,
            expires_at: ticket.expires_at,
        }
    }
}

// -- Handlers --

/// POST /tickets — issue a new ticket.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    let passenger_id = req
        .passenger_id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid passenger_id: {e}")))?;
    let trip_id = req
        .trip_id
        .map(|t| t.parse())
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("Invalid trip_id: {e}")))?;

    let ticket = state
        .tickets
        .issue(IssueTicketRequest {
            passenger_id,
            kind: req.kind,
            trip_id,
            route: req.route,
            rides: req.rides,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ticket.into())))
}

/// GET /tickets/:id — fetch a ticket by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket_id = parse_ticket_id(&id)?;
    let ticket = state.tickets.get(ticket_id).await?;
    Ok(Json(ticket.into()))
}

/// POST /tickets/:id/validate — validate a ticket at boarding.
#[tracing::instrument(skip(state))]
pub async fn validate<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket_id = parse_ticket_id(&id)?;
    let ticket = state.tickets.validate(ticket_id).await?;
    Ok(Json(ticket.into()))
}

pub(super) fn parse_ticket_id(id: &str) -> Result<TicketId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ticket id: {e}")))
}
