//! Notification administration and passenger inbox endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bus::EventBus;
use chrono::{DateTime, Utc};
use common::NotificationId;
use domain::{NotificationCategory, NotificationRecord, Recipient};
use serde::{Deserialize, Serialize};
use services::SendNotificationRequest;
use store::DocumentStore;

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateNotificationRequest {
    /// Passenger uuid string or `"all"` for a broadcast.
    pub recipient: Recipient,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

// -- Response types --

#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub recipient: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRecord> for NotificationResponse {
    fn from(record: NotificationRecord) -> Self {
        Self {
            id: record.id.to_string(),
            recipient: record.recipient.to_string(),
            category: record.category.to_string(),
            title: record.title,
            body: record.body,
            status: record.status.to_string(),
            created_at: record.created_at,
        }
    }
}

// -- Handlers --

/// POST /notifications — send a notification through the normal pipeline.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationResponse>), ApiError> {
    let record = state
        .notifications
        .send(SendNotificationRequest {
            recipient: req.recipient,
            category: req.category,
            title: req.title,
            body: req.body,
            metadata: req.metadata,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// POST /notifications/:id/read — mark a notification read.
#[tracing::instrument(skip(state))]
pub async fn mark_read<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let notification_id: NotificationId = id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid notification id: {e}")))?;
    let record = state.notifications.mark_read(notification_id).await?;
    Ok(Json(record.into()))
}

/// GET /passengers/:id/notifications — a passenger's inbox, broadcasts
/// included.
#[tracing::instrument(skip(state))]
pub async fn list_for_passenger<S: DocumentStore + 'static, B: EventBus + 'static>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let passenger_id = id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid passenger id: {e}")))?;
    let records = state.notifications.list_for_user(passenger_id).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}
