use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::EventType;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct DispatchRequest {
    #[validate(length(min = 1, message = "order_id cannot be empty"))]
    pub order_id: String,
    #[validate(length(min = 1, message = "event_type cannot be empty"))]
    pub event_type: String,
}

impl DispatchRequest {
    /// Validate and resolve the trigger input. Unknown event types and
    /// malformed order ids are rejected before any side effect.
    fn resolve(&self) -> Result<(Uuid, EventType), AppError> {
        self.validate()?;

        let order_id = Uuid::parse_str(&self.order_id).map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!("Invalid order_id: {}", self.order_id))
        })?;
        let event = EventType::from_str(&self.event_type).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Unknown event_type: {}", self.event_type))
        })?;

        Ok((order_id, event))
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookDispatchResponse {
    pub order_id: Uuid,
    pub event: String,
    pub webhooks_notified: u32,
    pub failed: u32,
}

#[derive(Debug, Serialize)]
pub struct CrmForwardResponse {
    pub order_id: Uuid,
    pub event: String,
    pub delivered: bool,
    pub skipped: bool,
}

#[tracing::instrument(skip(state, request))]
pub async fn notify_webhooks(
    State(state): State<AppState>,
    Json(request): Json<DispatchRequest>,
) -> Result<(StatusCode, Json<WebhookDispatchResponse>), AppError> {
    let (order_id, event) = request.resolve()?;

    let summary = state.dispatcher.notify_webhooks(order_id, event).await?;

    Ok((
        StatusCode::OK,
        Json(WebhookDispatchResponse {
            order_id,
            event: event.as_str().to_string(),
            webhooks_notified: summary.webhooks_notified,
            failed: summary.failed,
        }),
    ))
}

#[tracing::instrument(skip(state, request))]
pub async fn forward_to_crm(
    State(state): State<AppState>,
    Json(request): Json<DispatchRequest>,
) -> Result<(StatusCode, Json<CrmForwardResponse>), AppError> {
    let (order_id, event) = request.resolve()?;

    let outcome = state.dispatcher.forward_to_crm(order_id, event).await?;

    Ok((
        StatusCode::OK,
        Json(CrmForwardResponse {
            order_id,
            event: event.as_str().to_string(),
            delivered: outcome.delivered,
            skipped: outcome.skipped,
        }),
    ))
}
