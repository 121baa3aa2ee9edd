//! Trip seat-inventory administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bus::EventBus;
use common::TripId;
use serde::{Deserialize, Serialize};
use store::DocumentStore;

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateTripRequest {
    /// Optional fixed trip id; generated when absent.
    pub trip_id: Option<String>,
    pub total_seats: u32,
}

#[derive(Serialize)]
pub struct TripResponse {
    pub trip_id: String,
    pub total_seats: u32,
    pub available_seats: u32,
}

/// POST /trips — register a trip's seat inventory.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Json(req): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<TripResponse>), ApiError> {
    let trip_id = match req.trip_id {
        Some(id) => id
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("Invalid trip_id: {e}")))?,
        None => TripId::new(),
    };
    if req.total_seats == 0 {
        return Err(ApiError::BadRequest("total_seats must be positive".into()));
    }

    state.inventory.seed_trip(trip_id, req.total_seats).await?;
    Ok((
        StatusCode::CREATED,
        Json(TripResponse {
            trip_id: trip_id.to_string(),
            total_seats: req.total_seats,
            available_seats: req.total_seats,
        }),
    ))
}

/// GET /trips/:id/seats — current seat availability for a trip.
#[tracing::instrument(skip(state))]
pub async fn seats<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let trip_id: TripId = id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid trip id: {e}")))?;
    let available = state
        .inventory
        .available(trip_id)
        .await
        .map_err(|_| ApiError::NotFound(format!("Trip {trip_id} not found")))?;
    Ok(Json(serde_json::json!({
        "trip_id": trip_id.to_string(),
        "available_seats": available,
    })))
}
