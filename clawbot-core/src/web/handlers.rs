// clawbot-core/src/web/handlers.rs

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use constant_time_eq::constant_time_eq;
use serde_json::json;
use tracing::{info, warn};

use clawbot_common::models::{
    DeliveryInfo, InventoryStatus, PrizeDashboard, PrizeFilter, PrizeItem, QueueDashboard,
    QueueStatus,
};

use super::{ApiError, AppState};
use crate::eventbus::ClawEvent;
use crate::ingestion::{EventIngestion, IngestOutcome, WebhookHeaders};
use crate::services::PlayOutcome;

/// Un-marks an accepted message id unless the admission reached the bus,
/// so a delivery cut off by the request timeout can be retried.
struct PendingHandoff<'a> {
    ingestion: &'a EventIngestion,
    message_id: &'a str,
    delivered: bool,
}

impl Drop for PendingHandoff<'_> {
    fn drop(&mut self) {
        if !self.delivered && self.ingestion.forget(self.message_id) {
            warn!("[Webhook] Hand-off of '{}' did not complete; id released for retry", self.message_id);
        }
    }
}

/// `POST /webhook`
///
/// 403 on a bad signature, 400 on a malformed payload, 204 for events the
/// game does not use, 200 for accepted and duplicate deliveries.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let webhook_headers = WebhookHeaders::from_header_map(&headers);
    let outcome = state.ingestion.process(&webhook_headers, &body).map_err(|e| {
        warn!("[Webhook] Rejected delivery '{}': {}", webhook_headers.message_id, e);
        ApiError::from(e)
    })?;

    let response = match outcome {
        IngestOutcome::Challenge(challenge) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], challenge).into_response()
        }
        IngestOutcome::Duplicate { message_id } => {
            (StatusCode::OK, Json(json!({ "status": "duplicate", "message_id": message_id }))).into_response()
        }
        IngestOutcome::Ignored { .. } | IngestOutcome::Revoked { .. } => StatusCode::NO_CONTENT.into_response(),
        IngestOutcome::Accepted { message_id, admission, received_at } => {
            info!("[Webhook] Accepted {} ({})", message_id, admission.kind());
            let mut handoff = PendingHandoff { ingestion: &state.ingestion, message_id: &message_id, delivered: false };
            state
                .event_bus
                .publish(ClawEvent::Admission { message_id: message_id.clone(), admission, received_at })
                .await;
            handoff.delivered = true;
            drop(handoff);
            (StatusCode::OK, Json(json!({ "status": "accepted", "message_id": message_id }))).into_response()
        }
    };
    Ok(response)
}

pub async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.game.queue().status())
}

pub async fn queue_dashboard(State(state): State<AppState>) -> Json<QueueDashboard> {
    Json(state.game.queue().dashboard())
}

pub async fn prizes_inventory(State(state): State<AppState>) -> Json<InventoryStatus> {
    Json(state.game.prizes().inventory_status())
}

pub async fn prizes_dashboard(State(state): State<AppState>) -> Json<PrizeDashboard> {
    Json(state.game.prizes().dashboard())
}

/// `GET /prizes/available?type=digital&category=gaming&max_value=10`
pub async fn prizes_available(
    State(state): State<AppState>,
    Query(filter): Query<PrizeFilter>,
) -> Json<Vec<PrizeItem>> {
    Json(state.game.prizes().available_prizes(&filter))
}

/// Checks `Authorization: Bearer <token>` against the controller token.
fn authorize_controller(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");
    let expected = state.controller_token.as_bytes();
    if expected.is_empty() || !constant_time_eq(presented.as_bytes(), expected) {
        warn!(target: "security", "[Play] Rejected play request without a valid controller token");
        return Err(ApiError::unauthorized("missing or invalid controller token"));
    }
    Ok(())
}

/// `POST /play/{user_id}` with an optional `DeliveryInfo` body. Only the
/// machine controller may call it.
pub async fn play(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    authorize_controller(&state, &headers)?;
    let info = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let info: DeliveryInfo = serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid delivery info: {}", e)))?;
        Some(info)
    };

    let outcome = state.game.play(&user_id, info).await?;
    let status = match outcome {
        PlayOutcome::Played { .. } => StatusCode::OK,
        PlayOutcome::Rejected { .. } => StatusCode::CONFLICT,
    };
    Ok((status, Json(outcome)).into_response())
}

pub async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
