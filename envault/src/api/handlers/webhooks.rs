//! HTTP handlers for webhook ingestion and event inspection.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use tracing::instrument;

use crate::{
    AppState,
    api::models::webhooks::{HealthResponse, IngestResponse, RetryResponse, WebhookEventResponse},
    db::EventStore,
    db::models::events::ProcessingState,
    errors::{Error, Result},
    types::EventId,
};

/// Header carrying the base64 HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-docusign-signature-1";

/// Receive a webhook notification from the signing provider.
///
/// The body is taken as a raw string so the signature is verified over the
/// exact bytes the sender signed. Responds as soon as the event is durable;
/// processing happens in the background.
#[utoipa::path(
    post,
    path = "/webhooks/docusign",
    tag = "webhooks",
    summary = "Receive webhook",
    description = "Receive a signing-provider notification. The event is persisted and processed asynchronously.",
    request_body(content_type = "application/json", description = "Raw provider payload"),
    responses(
        (status = 200, description = "Event accepted", body = IngestResponse),
        (status = 401, description = "Invalid signature"),
        (status = 500, description = "Internal server error"),
    )
)]
#[instrument(skip_all)]
pub async fn receive_webhook(State(state): State<AppState>, headers: HeaderMap, body: String) -> Result<Json<IngestResponse>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let event_id = state.processor.ingest(body, signature).await?;

    Ok(Json(IngestResponse {
        message: "Webhook received".to_string(),
        event_id,
    }))
}

/// Get a stored webhook event by id.
#[utoipa::path(
    get,
    path = "/webhooks/docusign/{id}",
    tag = "webhooks",
    summary = "Get webhook event",
    responses(
        (status = 200, description = "Webhook event", body = WebhookEventResponse),
        (status = 404, description = "Event not found"),
        (status = 500, description = "Internal server error"),
    ),
    params(
        ("id" = uuid::Uuid, Path, description = "Webhook event ID"),
    )
)]
#[instrument(skip_all, fields(event_id = %id))]
pub async fn get_webhook_event(State(state): State<AppState>, Path(id): Path<EventId>) -> Result<Json<WebhookEventResponse>> {
    let event = state.store.get_event(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Webhook event".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(event.into()))
}

/// Manually retry a webhook event.
///
/// Events that completed or are currently processing are rejected. Anything
/// else, including events past their automatic retry budget, is reset and
/// re-processed in the background.
#[utoipa::path(
    post,
    path = "/webhooks/docusign/{id}/retry",
    tag = "webhooks",
    summary = "Retry webhook event",
    responses(
        (status = 200, description = "Retry started", body = RetryResponse),
        (status = 400, description = "Event not in a retryable state"),
        (status = 404, description = "Event not found"),
        (status = 500, description = "Internal server error"),
    ),
    params(
        ("id" = uuid::Uuid, Path, description = "Webhook event ID"),
    )
)]
#[instrument(skip_all, fields(event_id = %id))]
pub async fn retry_webhook_event(State(state): State<AppState>, Path(id): Path<EventId>) -> Result<Json<RetryResponse>> {
    let event = state.store.get_event(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Webhook event".to_string(),
        id: id.to_string(),
    })?;

    match event.state() {
        ProcessingState::Completed => {
            return Err(Error::BadRequest {
                message: "Event already completed successfully".to_string(),
            });
        }
        ProcessingState::Processing => {
            return Err(Error::BadRequest {
                message: "Event is currently being processed".to_string(),
            });
        }
        _ => {}
    }

    state.store.reset_for_retry(id).await?;
    state.processor.spawn_process(id);

    Ok(Json(RetryResponse {
        message: "Retry started".to_string(),
        event_id: id,
    }))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/webhooks/health",
    tag = "webhooks",
    summary = "Health check",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
